//! Encoding of an [`InstructionList`] back into a code array.
//!
//! [`encode_code`] lays the list out with [`InstructionList::recompute_positions`] and then
//! emits every instruction through an [`InstructionEncoder`], which always picks the most
//! compact encoding of an instruction family:
//!
//! - `<t>load_<n>`/`<t>store_<n>` for slots 0-3, the one-byte index form up to 255, and the
//!   `wide` form beyond
//! - `iconst_<n>`, `bipush` or `sipush` for `int` pushes by value, and `lconst`, `fconst`,
//!   `dconst` for the literals they can express
//! - `ldc` for narrow pool indices up to 255, `ldc_w` above, `ldc2_w` for wide entries
//! - `iinc` unless the slot or the increment needs `wide`
//! - `goto`/`jsr` unless layout widened them to `goto_w`/`jsr_w`
//!
//! A decoded method therefore re-encodes to the bytes `javac` produced, as long as the
//! compiler picked the compact forms too.
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{encode_code, Instruction, InstructionList, TypeTag};
//!
//! let mut list = InstructionList::new();
//! list.append(Instruction::Load { slot: 1, ty: TypeTag::Int });
//! list.append(Instruction::Load { slot: 300, ty: TypeTag::Long });
//!
//! let (code, handlers) = encode_code(&mut list)?;
//! assert_eq!(code, vec![0x1B, 0xC4, 0x16, 0x01, 0x2C]);
//! assert!(handlers.is_empty());
//! # Ok::<(), classfold::Error>(())
//! ```

use crate::{
    assembly::{
        instruction::{arithmetic_opcode, convert_opcode, typed_opcode},
        opcodes, CompareKind, Instruction, InstructionHandle, InstructionList, NumericValue,
        SwitchKind, TypeTag,
    },
    file::io::write_be,
    metadata::ExceptionTableEntry,
    Error, Result,
};

/// Encodes `list` into a code array and an exception table.
///
/// Positions are recomputed first, so the list is left laid out: after this call
/// [`InstructionList::position`] returns the offsets the code array uses.
///
/// # Errors
///
/// Returns the errors of [`InstructionList::recompute_positions`], and
/// [`crate::Error::InvalidOperand`] for instructions that have no encoding (an `int`
/// push typed as `long`, bitwise arithmetic on floats, a non-contiguous `tableswitch`, ...).
pub fn encode_code(list: &mut InstructionList) -> Result<(Vec<u8>, Vec<ExceptionTableEntry>)> {
    let code_length = list.recompute_positions()?;

    let mut encoder = InstructionEncoder::with_capacity(code_length as usize);
    for (handle, instruction) in list.iter() {
        encoder.emit(list, handle, instruction)?;
    }
    let code = encoder.finalize();

    if code.len() != code_length as usize {
        return Err(malformed_error!(
            "Encoded {} bytes but layout computed {}",
            code.len(),
            code_length
        ));
    }

    let offset = |handle: InstructionHandle| -> Result<u16> {
        let position = list.position(handle).ok_or(Error::InvalidHandle(handle))?;
        u16::try_from(position).map_err(|_| Error::BranchOutOfRange { offset: position })
    };

    let mut exception_table = Vec::with_capacity(list.exception_handlers().len());
    for entry in list.exception_handlers() {
        exception_table.push(ExceptionTableEntry {
            start_pc: offset(entry.start)?,
            end_pc: match entry.end {
                Some(end) => offset(end)?,
                None => u16::try_from(code_length).map_err(|_| Error::BranchOutOfRange {
                    offset: code_length,
                })?,
            },
            handler_pc: offset(entry.handler)?,
            catch_type: entry.catch_type,
        });
    }

    Ok((code, exception_table))
}

/// Number of bytes `instruction` occupies when it starts at `position`.
///
/// Only switches depend on the position, through their alignment padding. `long_form`
/// selects `goto_w`/`jsr_w`. Instructions without an encoding report the size of their
/// opcode byte; [`encode_code`] rejects them.
pub(crate) fn encoded_size(instruction: &Instruction, position: u32, long_form: bool) -> u32 {
    match instruction {
        Instruction::ConstPush { value, ty } => match const_form(*value, *ty) {
            Ok(ConstForm::Opcode(_)) | Err(_) => 1,
            Ok(ConstForm::Byte(_)) => 2,
            Ok(ConstForm::Short(_)) => 3,
        },
        Instruction::PoolLoad { index, wide } => {
            if !*wide && *index <= 0xFF {
                2
            } else {
                3
            }
        }
        Instruction::Load { slot, .. } | Instruction::Store { slot, .. } => match slot {
            0..=3 => 1,
            4..=255 => 2,
            _ => 4,
        },
        Instruction::Convert { .. } | Instruction::Arithmetic { .. } | Instruction::Compare(_) => 1,
        Instruction::If { .. } | Instruction::InvokeVirtual { .. } => 3,
        Instruction::Goto { .. } | Instruction::Jsr { .. } => {
            if long_form {
                5
            } else {
                3
            }
        }
        Instruction::IncrementLocal { slot, amount } => {
            if *slot <= 0xFF && i8::try_from(*amount).is_ok() {
                3
            } else {
                6
            }
        }
        Instruction::Switch { kind, cases, .. } => {
            let padding = switch_padding(position);
            let cases = u32::try_from(cases.len()).unwrap_or(u32::MAX);
            let body = match kind {
                SwitchKind::Table => 12 + 4 * cases,
                SwitchKind::Lookup => 8 + 8 * cases,
            };
            1 + padding + body
        }
        Instruction::Other(opaque) => {
            let prefix = u32::from(opaque.wide);
            let operands = u32::try_from(opaque.operands.len()).unwrap_or(u32::MAX);
            1 + prefix + operands
        }
    }
}

fn switch_padding(position: u32) -> u32 {
    (4 - (position + 1) % 4) % 4
}

enum ConstForm {
    Opcode(u8),
    Byte(i8),
    Short(i16),
}

fn const_form(value: NumericValue, ty: TypeTag) -> Result<ConstForm> {
    let form = match (value, ty) {
        (NumericValue::I32(v), TypeTag::Byte) => i8::try_from(v).ok().map(ConstForm::Byte),
        (NumericValue::I32(v), TypeTag::Short) => i16::try_from(v).ok().map(ConstForm::Short),
        (NumericValue::I32(v), TypeTag::Int | TypeTag::Char) => match v {
            -1..=5 => u8::try_from(i32::from(opcodes::ICONST_0) + v)
                .ok()
                .map(ConstForm::Opcode),
            _ => i8::try_from(v)
                .map(ConstForm::Byte)
                .or_else(|_| i16::try_from(v).map(ConstForm::Short))
                .ok(),
        },
        (NumericValue::I64(0), TypeTag::Long) => Some(ConstForm::Opcode(opcodes::LCONST_0)),
        (NumericValue::I64(1), TypeTag::Long) => Some(ConstForm::Opcode(opcodes::LCONST_1)),
        (NumericValue::F32(v), TypeTag::Float) => match v.to_bits() {
            bits if bits == 0.0_f32.to_bits() => Some(ConstForm::Opcode(opcodes::FCONST_0)),
            bits if bits == 1.0_f32.to_bits() => Some(ConstForm::Opcode(opcodes::FCONST_1)),
            bits if bits == 2.0_f32.to_bits() => Some(ConstForm::Opcode(opcodes::FCONST_2)),
            _ => None,
        },
        (NumericValue::F64(v), TypeTag::Double) => match v.to_bits() {
            bits if bits == 0.0_f64.to_bits() => Some(ConstForm::Opcode(opcodes::DCONST_0)),
            bits if bits == 1.0_f64.to_bits() => Some(ConstForm::Opcode(opcodes::DCONST_1)),
            _ => None,
        },
        _ => None,
    };

    form.ok_or_else(|| {
        Error::InvalidOperand(format!("no constant push encodes {value} as {ty}"))
    })
}

/// Byte buffer that emits instructions in their most compact encoding.
///
/// Branch displacements are computed from positions the caller has already laid out, so the
/// encoder never needs fixups.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    bytecode: Vec<u8>,
}

impl InstructionEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        InstructionEncoder::default()
    }

    /// Creates an empty encoder with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        InstructionEncoder {
            bytecode: Vec::with_capacity(capacity),
        }
    }

    /// Current write offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    /// Returns the emitted bytes.
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        self.bytecode
    }

    /// Emits `instruction`, located at `handle` in the laid out `list`.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperand`] for an instruction without an encoding and
    /// [`crate::Error::InvalidHandle`] for a branch target without a position.
    pub fn emit(
        &mut self,
        list: &InstructionList,
        handle: InstructionHandle,
        instruction: &Instruction,
    ) -> Result<()> {
        match instruction {
            Instruction::ConstPush { value, ty } => self.emit_const(*value, *ty)?,
            Instruction::PoolLoad { index, wide } => self.emit_pool_load(*index, *wide),
            Instruction::Load { slot, ty } => {
                self.emit_local(opcodes::ILOAD, opcodes::ILOAD_0, *slot, *ty);
            }
            Instruction::Store { slot, ty } => {
                self.emit_local(opcodes::ISTORE, opcodes::ISTORE_0, *slot, *ty);
            }
            Instruction::Convert { from, to } => {
                let opcode = convert_opcode(*from, *to);
                if opcode == opcodes::NOP {
                    return Err(Error::InvalidOperand(format!(
                        "no conversion from {from} to {to}"
                    )));
                }
                self.bytecode.push(opcode);
            }
            Instruction::Arithmetic { op, ty } => {
                if (op.is_bitwise() && ty.is_floating()) || *ty == TypeTag::Reference {
                    return Err(Error::InvalidOperand(format!(
                        "{} has no {} variant",
                        op.name(),
                        ty
                    )));
                }
                self.bytecode.push(arithmetic_opcode(*op, *ty));
            }
            Instruction::Compare(kind) => self.bytecode.push(match kind {
                CompareKind::Lcmp => opcodes::LCMP,
                CompareKind::FcmpL => opcodes::FCMPL,
                CompareKind::FcmpG => opcodes::FCMPG,
                CompareKind::DcmpL => opcodes::DCMPL,
                CompareKind::DcmpG => opcodes::DCMPG,
            }),
            Instruction::If { condition, target } => {
                let displacement = Self::displacement(list, handle, *target)?;
                let short = i16::try_from(displacement).map_err(|_| Error::BranchOutOfRange {
                    offset: list.position(handle).unwrap_or_default(),
                })?;
                self.bytecode.push(condition.opcode());
                write_be(&mut self.bytecode, short);
            }
            Instruction::Goto { target } | Instruction::Jsr { target } => {
                let is_goto = matches!(instruction, Instruction::Goto { .. });
                let displacement = Self::displacement(list, handle, *target)?;
                if list.is_long_form(handle) {
                    self.bytecode
                        .push(if is_goto { opcodes::GOTO_W } else { opcodes::JSR_W });
                    write_be(&mut self.bytecode, displacement);
                } else {
                    let short = i16::try_from(displacement).map_err(|_| Error::BranchOutOfRange {
                        offset: list.position(handle).unwrap_or_default(),
                    })?;
                    self.bytecode
                        .push(if is_goto { opcodes::GOTO } else { opcodes::JSR });
                    write_be(&mut self.bytecode, short);
                }
            }
            Instruction::IncrementLocal { slot, amount } => self.emit_iinc(*slot, *amount),
            Instruction::InvokeVirtual { index } => {
                self.bytecode.push(opcodes::INVOKEVIRTUAL);
                write_be(&mut self.bytecode, *index);
            }
            Instruction::Switch {
                kind,
                default,
                cases,
            } => self.emit_switch(list, handle, *kind, *default, cases)?,
            Instruction::Other(opaque) => {
                if opaque.wide {
                    self.bytecode.push(opcodes::WIDE);
                }
                self.bytecode.push(opaque.opcode);
                self.bytecode.extend_from_slice(&opaque.operands);
            }
        }

        Ok(())
    }

    /// Emits a constant push.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidOperand`] if no push instruction encodes `value` as `ty`.
    pub fn emit_const(&mut self, value: NumericValue, ty: TypeTag) -> Result<()> {
        match const_form(value, ty)? {
            ConstForm::Opcode(opcode) => self.bytecode.push(opcode),
            ConstForm::Byte(v) => {
                self.bytecode.push(opcodes::BIPUSH);
                write_be(&mut self.bytecode, v);
            }
            ConstForm::Short(v) => {
                self.bytecode.push(opcodes::SIPUSH);
                write_be(&mut self.bytecode, v);
            }
        }
        Ok(())
    }

    /// Emits `ldc`, `ldc_w` or `ldc2_w`.
    pub fn emit_pool_load(&mut self, index: u16, wide: bool) {
        if wide {
            self.bytecode.push(opcodes::LDC2_W);
            write_be(&mut self.bytecode, index);
        } else if let Ok(narrow) = u8::try_from(index) {
            self.bytecode.push(opcodes::LDC);
            self.bytecode.push(narrow);
        } else {
            self.bytecode.push(opcodes::LDC_W);
            write_be(&mut self.bytecode, index);
        }
    }

    /// Emits a load or store in its shortest form.
    ///
    /// `base` is the `int` opcode of the indexed form (`iload`, `istore`), `short_base` the
    /// `int` opcode of the `_0` form.
    pub fn emit_local(&mut self, base: u8, short_base: u8, slot: u16, ty: TypeTag) {
        let family = typed_opcode(base, ty) - base;
        match slot {
            0..=3 => {
                #[allow(clippy::cast_possible_truncation)]
                self.bytecode.push(short_base + family * 4 + slot as u8);
            }
            4..=255 => {
                self.bytecode.push(base + family);
                #[allow(clippy::cast_possible_truncation)]
                self.bytecode.push(slot as u8);
            }
            _ => {
                self.bytecode.push(opcodes::WIDE);
                self.bytecode.push(base + family);
                write_be(&mut self.bytecode, slot);
            }
        }
    }

    /// Emits `iinc`, prefixed with `wide` when the operands need it.
    pub fn emit_iinc(&mut self, slot: u16, amount: i16) {
        match (u8::try_from(slot), i8::try_from(amount)) {
            (Ok(slot), Ok(amount)) => {
                self.bytecode.push(opcodes::IINC);
                self.bytecode.push(slot);
                write_be(&mut self.bytecode, amount);
            }
            _ => {
                self.bytecode.push(opcodes::WIDE);
                self.bytecode.push(opcodes::IINC);
                write_be(&mut self.bytecode, slot);
                write_be(&mut self.bytecode, amount);
            }
        }
    }

    fn emit_switch(
        &mut self,
        list: &InstructionList,
        handle: InstructionHandle,
        kind: SwitchKind,
        default: InstructionHandle,
        cases: &[(i32, InstructionHandle)],
    ) -> Result<()> {
        let position = list.position(handle).ok_or(Error::InvalidHandle(handle))?;
        self.bytecode.push(match kind {
            SwitchKind::Table => opcodes::TABLESWITCH,
            SwitchKind::Lookup => opcodes::LOOKUPSWITCH,
        });
        for _ in 0..switch_padding(position) {
            self.bytecode.push(0);
        }
        write_be(&mut self.bytecode, Self::displacement(list, handle, default)?);

        match kind {
            SwitchKind::Table => {
                let (Some((low, _)), Some((high, _))) = (cases.first(), cases.last()) else {
                    return Err(Error::InvalidOperand(
                        "tableswitch needs at least one case".to_string(),
                    ));
                };
                let contiguous = cases
                    .windows(2)
                    .all(|pair| i64::from(pair[0].0) + 1 == i64::from(pair[1].0));
                if !contiguous {
                    return Err(Error::InvalidOperand(
                        "tableswitch keys are not contiguous".to_string(),
                    ));
                }

                write_be(&mut self.bytecode, *low);
                write_be(&mut self.bytecode, *high);
                for (_, target) in cases {
                    write_be(&mut self.bytecode, Self::displacement(list, handle, *target)?);
                }
            }
            SwitchKind::Lookup => {
                if cases.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
                    return Err(Error::InvalidOperand(
                        "lookupswitch keys are not sorted".to_string(),
                    ));
                }

                let count = i32::try_from(cases.len()).map_err(|_| {
                    Error::InvalidOperand("lookupswitch has too many cases".to_string())
                })?;
                write_be(&mut self.bytecode, count);
                for (key, target) in cases {
                    write_be(&mut self.bytecode, *key);
                    write_be(&mut self.bytecode, Self::displacement(list, handle, *target)?);
                }
            }
        }

        Ok(())
    }

    fn displacement(
        list: &InstructionList,
        from: InstructionHandle,
        to: InstructionHandle,
    ) -> Result<i32> {
        let source = list.position(from).ok_or(Error::InvalidHandle(from))?;
        let target = list.position(to).ok_or(Error::InvalidHandle(to))?;
        i32::try_from(i64::from(target) - i64::from(source))
            .map_err(|_| Error::BranchOutOfRange { offset: source })
    }
}
