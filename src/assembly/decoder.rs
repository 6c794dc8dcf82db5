//! Decoding of method code arrays into an [`InstructionList`].
//!
//! The decoder turns the raw bytecode of a `Code` attribute into the closed [`Instruction`]
//! model. Byte offsets only exist during decoding: every branch, switch and exception table
//! offset is resolved to the [`InstructionHandle`] of the instruction that starts there, and
//! an offset that does not fall on an instruction boundary is rejected as malformed.
//!
//! # Stack Effects
//!
//! Field accesses and invocations have a stack effect that depends on a descriptor in the
//! constant pool. The decoder resolves those once, so every [`OpaqueInstruction`] carries
//! its final [`StackBehavior`]. `invokevirtual` is modelled explicitly and resolved by
//! [`crate::assembly::max_stack`] instead.
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{decode_code, Instruction};
//! use classfold::metadata::{Code, ConstantPool};
//!
//! // iconst_2, iconst_3, iadd, ireturn
//! let code = Code::new(2, 0, vec![0x05, 0x06, 0x60, 0xAC]);
//! let list = decode_code(&code, &ConstantPool::new())?;
//!
//! assert_eq!(list.len(), 4);
//! let (_, first) = list.iter().next().unwrap();
//! assert_eq!(first, &Instruction::int_const(2));
//! # Ok::<(), classfold::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        instructions::{OperandType, INSTRUCTIONS},
        opcodes, ArithmeticOp, CompareKind, Condition, ExceptionHandler, FlowType, Instruction,
        InstructionHandle, InstructionList, NumericValue, OpaqueInstruction, Relation,
        StackBehavior, SwitchKind, TypeTag,
    },
    file::Parser,
    metadata::{Code, ConstantPool, FieldType, MethodDescriptor},
    Result,
};

const FAMILY_TYPES: [TypeTag; 5] = [
    TypeTag::Int,
    TypeTag::Long,
    TypeTag::Float,
    TypeTag::Double,
    TypeTag::Reference,
];

const RELATIONS: [Relation; 6] = [
    Relation::Eq,
    Relation::Ne,
    Relation::Lt,
    Relation::Ge,
    Relation::Gt,
    Relation::Le,
];

const CONVERSIONS: [(TypeTag, TypeTag); 15] = [
    (TypeTag::Int, TypeTag::Long),
    (TypeTag::Int, TypeTag::Float),
    (TypeTag::Int, TypeTag::Double),
    (TypeTag::Long, TypeTag::Int),
    (TypeTag::Long, TypeTag::Float),
    (TypeTag::Long, TypeTag::Double),
    (TypeTag::Float, TypeTag::Int),
    (TypeTag::Float, TypeTag::Long),
    (TypeTag::Float, TypeTag::Double),
    (TypeTag::Double, TypeTag::Int),
    (TypeTag::Double, TypeTag::Long),
    (TypeTag::Double, TypeTag::Float),
    (TypeTag::Int, TypeTag::Byte),
    (TypeTag::Int, TypeTag::Char),
    (TypeTag::Int, TypeTag::Short),
];

/// Decodes the code array and exception table of `code`.
///
/// Instructions are numbered in stream order, so the instruction at index `i` of the code
/// array gets `InstructionHandle::new(i)`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if:
/// - an opcode is undefined, or `wide` prefixes an opcode it cannot modify
/// - a branch, switch or exception table offset is not an instruction boundary
/// - a constant pool reference used for a stack effect is missing or has the wrong kind
///
/// Returns [`crate::Error::OutOfBounds`] if the last instruction is truncated.
pub fn decode_code(code: &Code, pool: &ConstantPool) -> Result<InstructionList> {
    let mut parser = Parser::new(&code.code);
    let mut instructions = Vec::new();
    let mut boundaries = HashMap::new();

    while parser.has_more_data() {
        let offset = parser.pos();
        let index = u32::try_from(instructions.len())
            .map_err(|_| malformed_error!("Code array holds too many instructions"))?;
        boundaries.insert(offset, index);
        instructions.push(decode_instruction(&mut parser, pool)?);
    }

    let code_length = parser.pos();
    let resolve = |offset: usize| -> Result<InstructionHandle> {
        boundaries
            .get(&offset)
            .map(|index| InstructionHandle::new(*index))
            .ok_or_else(|| {
                malformed_error!(
                    "Offset {} is not an instruction boundary (code length {})",
                    offset,
                    code_length
                )
            })
    };

    for instruction in &mut instructions {
        for target in instruction.targets_mut() {
            *target = resolve(target.index())?;
        }
    }

    let mut list = InstructionList::from_vec(instructions);
    for entry in &code.exception_table {
        let end = usize::from(entry.end_pc);
        let handler = ExceptionHandler {
            start: resolve(usize::from(entry.start_pc))?,
            end: if end == code_length {
                None
            } else {
                Some(resolve(end)?)
            },
            handler: resolve(usize::from(entry.handler_pc))?,
            catch_type: entry.catch_type,
        };
        list.add_exception_handler(handler)?;
    }

    Ok(list)
}

/// Decodes a single instruction at the parser position.
///
/// Branch targets are returned as absolute byte offsets wrapped in an
/// [`InstructionHandle`]; [`decode_code`] maps them to real handles afterwards.
///
/// # Errors
/// See [`decode_code`].
pub(crate) fn decode_instruction(parser: &mut Parser, pool: &ConstantPool) -> Result<Instruction> {
    let offset = parser.pos();
    let opcode = parser.read_be::<u8>()?;

    let instruction = match opcode {
        opcodes::ICONST_M1..=opcodes::ICONST_5 => {
            Instruction::int_const(i32::from(opcode) - i32::from(opcodes::ICONST_0))
        }
        opcodes::LCONST_0 | opcodes::LCONST_1 => Instruction::ConstPush {
            value: NumericValue::I64(i64::from(opcode - opcodes::LCONST_0)),
            ty: TypeTag::Long,
        },
        opcodes::FCONST_0..=opcodes::FCONST_2 => Instruction::ConstPush {
            value: NumericValue::F32(f32::from(opcode - opcodes::FCONST_0)),
            ty: TypeTag::Float,
        },
        opcodes::DCONST_0 | opcodes::DCONST_1 => Instruction::ConstPush {
            value: NumericValue::F64(f64::from(opcode - opcodes::DCONST_0)),
            ty: TypeTag::Double,
        },
        opcodes::BIPUSH => Instruction::ConstPush {
            value: NumericValue::I32(i32::from(parser.read_be::<i8>()?)),
            ty: TypeTag::Byte,
        },
        opcodes::SIPUSH => Instruction::ConstPush {
            value: NumericValue::I32(i32::from(parser.read_be::<i16>()?)),
            ty: TypeTag::Short,
        },
        opcodes::LDC => Instruction::PoolLoad {
            index: u16::from(parser.read_be::<u8>()?),
            wide: false,
        },
        opcodes::LDC_W | opcodes::LDC2_W => Instruction::PoolLoad {
            index: parser.read_be::<u16>()?,
            wide: opcode == opcodes::LDC2_W,
        },
        opcodes::ILOAD..=opcodes::ALOAD => Instruction::Load {
            slot: u16::from(parser.read_be::<u8>()?),
            ty: FAMILY_TYPES[usize::from(opcode - opcodes::ILOAD)],
        },
        opcodes::ILOAD_0..=opcodes::ALOAD_3 => {
            let n = opcode - opcodes::ILOAD_0;
            Instruction::Load {
                slot: u16::from(n % 4),
                ty: FAMILY_TYPES[usize::from(n / 4)],
            }
        }
        opcodes::ISTORE..=opcodes::ASTORE => Instruction::Store {
            slot: u16::from(parser.read_be::<u8>()?),
            ty: FAMILY_TYPES[usize::from(opcode - opcodes::ISTORE)],
        },
        opcodes::ISTORE_0..=opcodes::ASTORE_3 => {
            let n = opcode - opcodes::ISTORE_0;
            Instruction::Store {
                slot: u16::from(n % 4),
                ty: FAMILY_TYPES[usize::from(n / 4)],
            }
        }
        opcodes::IADD..=opcodes::DREM => {
            const OPS: [ArithmeticOp; 5] = [
                ArithmeticOp::Add,
                ArithmeticOp::Sub,
                ArithmeticOp::Mul,
                ArithmeticOp::Div,
                ArithmeticOp::Rem,
            ];
            let n = usize::from(opcode - opcodes::IADD);
            Instruction::Arithmetic {
                op: OPS[n / 4],
                ty: FAMILY_TYPES[n % 4],
            }
        }
        opcodes::ISHL..=opcodes::LXOR => {
            const OPS: [ArithmeticOp; 6] = [
                ArithmeticOp::Shl,
                ArithmeticOp::Shr,
                ArithmeticOp::Ushr,
                ArithmeticOp::And,
                ArithmeticOp::Or,
                ArithmeticOp::Xor,
            ];
            let n = usize::from(opcode - opcodes::ISHL);
            Instruction::Arithmetic {
                op: OPS[n / 2],
                ty: FAMILY_TYPES[n % 2],
            }
        }
        opcodes::IINC => Instruction::IncrementLocal {
            slot: u16::from(parser.read_be::<u8>()?),
            amount: i16::from(parser.read_be::<i8>()?),
        },
        opcodes::I2L..=opcodes::I2S => {
            let (from, to) = CONVERSIONS[usize::from(opcode - opcodes::I2L)];
            Instruction::Convert { from, to }
        }
        opcodes::LCMP => Instruction::Compare(CompareKind::Lcmp),
        opcodes::FCMPL => Instruction::Compare(CompareKind::FcmpL),
        opcodes::FCMPG => Instruction::Compare(CompareKind::FcmpG),
        opcodes::DCMPL => Instruction::Compare(CompareKind::DcmpL),
        opcodes::DCMPG => Instruction::Compare(CompareKind::DcmpG),
        opcodes::IFEQ..=opcodes::IF_ACMPNE | opcodes::IFNULL | opcodes::IFNONNULL => {
            let condition = match opcode {
                opcodes::IFEQ..=opcodes::IFLE => {
                    Condition::Zero(RELATIONS[usize::from(opcode - opcodes::IFEQ)])
                }
                opcodes::IF_ICMPEQ..=opcodes::IF_ICMPLE => {
                    Condition::IntCompare(RELATIONS[usize::from(opcode - opcodes::IF_ICMPEQ)])
                }
                opcodes::IF_ACMPEQ => Condition::RefEqual,
                opcodes::IF_ACMPNE => Condition::RefNotEqual,
                opcodes::IFNULL => Condition::Null,
                _ => Condition::NonNull,
            };
            let displacement = i32::from(parser.read_be::<i16>()?);
            Instruction::If {
                condition,
                target: branch_target(offset, displacement)?,
            }
        }
        opcodes::GOTO | opcodes::JSR | opcodes::GOTO_W | opcodes::JSR_W => {
            let displacement = if opcode == opcodes::GOTO || opcode == opcodes::JSR {
                i32::from(parser.read_be::<i16>()?)
            } else {
                parser.read_be::<i32>()?
            };
            let target = branch_target(offset, displacement)?;
            if opcode == opcodes::GOTO || opcode == opcodes::GOTO_W {
                Instruction::Goto { target }
            } else {
                Instruction::Jsr { target }
            }
        }
        opcodes::TABLESWITCH | opcodes::LOOKUPSWITCH => decode_switch(parser, offset, opcode)?,
        opcodes::INVOKEVIRTUAL => Instruction::InvokeVirtual {
            index: parser.read_be::<u16>()?,
        },
        opcodes::WIDE => decode_wide(parser, offset)?,
        _ => Instruction::Other(decode_opaque(parser, offset, opcode, pool)?),
    };

    Ok(instruction)
}

fn branch_target(offset: usize, displacement: i32) -> Result<InstructionHandle> {
    let target = i64::try_from(offset).unwrap_or(i64::MAX) + i64::from(displacement);
    u32::try_from(target)
        .map(InstructionHandle::new)
        .map_err(|_| {
            malformed_error!(
                "Branch at offset {} targets invalid offset {}",
                offset,
                target
            )
        })
}

fn decode_switch(parser: &mut Parser, offset: usize, opcode: u8) -> Result<Instruction> {
    parser.align(4)?;
    let default = branch_target(offset, parser.read_be::<i32>()?)?;

    let (kind, cases) = if opcode == opcodes::TABLESWITCH {
        let low = parser.read_be::<i32>()?;
        let high = parser.read_be::<i32>()?;
        if low > high {
            return Err(malformed_error!(
                "tableswitch at offset {} has low {} above high {}",
                offset,
                low,
                high
            ));
        }

        let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
            .map_err(|_| malformed_error!("tableswitch at offset {} is too large", offset))?;
        if count.saturating_mul(4) > parser.remaining() {
            return Err(crate::Error::OutOfBounds);
        }

        let mut cases = Vec::with_capacity(count);
        for key in low..=high {
            cases.push((key, branch_target(offset, parser.read_be::<i32>()?)?));
        }
        (SwitchKind::Table, cases)
    } else {
        let pairs = parser.read_be::<i32>()?;
        let count = usize::try_from(pairs).map_err(|_| {
            malformed_error!(
                "lookupswitch at offset {} has negative pair count {}",
                offset,
                pairs
            )
        })?;
        if count.saturating_mul(8) > parser.remaining() {
            return Err(crate::Error::OutOfBounds);
        }

        let mut cases: Vec<(i32, InstructionHandle)> = Vec::with_capacity(count);
        for _ in 0..count {
            let key = parser.read_be::<i32>()?;
            if cases.last().is_some_and(|(previous, _)| *previous >= key) {
                return Err(malformed_error!(
                    "lookupswitch at offset {} has unsorted key {}",
                    offset,
                    key
                ));
            }
            cases.push((key, branch_target(offset, parser.read_be::<i32>()?)?));
        }
        (SwitchKind::Lookup, cases)
    };

    Ok(Instruction::Switch {
        kind,
        default,
        cases,
    })
}

fn decode_wide(parser: &mut Parser, offset: usize) -> Result<Instruction> {
    let opcode = parser.read_be::<u8>()?;
    let instruction = match opcode {
        opcodes::ILOAD..=opcodes::ALOAD => Instruction::Load {
            slot: parser.read_be::<u16>()?,
            ty: FAMILY_TYPES[usize::from(opcode - opcodes::ILOAD)],
        },
        opcodes::ISTORE..=opcodes::ASTORE => Instruction::Store {
            slot: parser.read_be::<u16>()?,
            ty: FAMILY_TYPES[usize::from(opcode - opcodes::ISTORE)],
        },
        opcodes::IINC => Instruction::IncrementLocal {
            slot: parser.read_be::<u16>()?,
            amount: parser.read_be::<i16>()?,
        },
        opcodes::RET => Instruction::Other(OpaqueInstruction {
            opcode,
            wide: true,
            operands: parser.read_bytes(2)?.to_vec(),
            stack: StackBehavior::default(),
            flow: FlowType::SubroutineReturn,
        }),
        _ => {
            return Err(malformed_error!(
                "wide at offset {} modifies opcode 0x{:02X}",
                offset,
                opcode
            ))
        }
    };

    Ok(instruction)
}

fn decode_opaque(
    parser: &mut Parser,
    offset: usize,
    opcode: u8,
    pool: &ConstantPool,
) -> Result<OpaqueInstruction> {
    let info = INSTRUCTIONS.get(usize::from(opcode)).ok_or_else(|| {
        malformed_error!("Invalid opcode 0x{:02X} at offset {}", opcode, offset)
    })?;

    let operand_length = match info.op_type {
        OperandType::None => 0,
        OperandType::Int8 | OperandType::Local | OperandType::PoolIndex8 | OperandType::ArrayType => 1,
        OperandType::Int16
        | OperandType::PoolIndex16
        | OperandType::FieldRef
        | OperandType::MethodRef
        | OperandType::Iinc
        | OperandType::Branch16 => 2,
        OperandType::MultiANewArray => 3,
        OperandType::InvokeInterface | OperandType::InvokeDynamic | OperandType::Branch32 => 4,
        OperandType::TableSwitch | OperandType::LookupSwitch | OperandType::Wide => {
            return Err(malformed_error!(
                "Opcode {} at offset {} cannot be kept opaque",
                info.instr,
                offset
            ))
        }
    };
    let operands = parser.read_bytes(operand_length)?.to_vec();

    let (extra_pops, extra_pushes) = match info.op_type {
        OperandType::FieldRef => {
            let index = u16::from_be_bytes([operands[0], operands[1]]);
            let slots = FieldType::parse(pool.member_descriptor(index)?)?.slots();
            match opcode {
                opcodes::GETSTATIC | opcodes::GETFIELD => (0, slots),
                _ => (slots, 0),
            }
        }
        OperandType::MethodRef | OperandType::InvokeInterface | OperandType::InvokeDynamic => {
            let index = u16::from_be_bytes([operands[0], operands[1]]);
            let descriptor = MethodDescriptor::parse(pool.member_descriptor(index)?)?;
            (descriptor.parameter_slots(), descriptor.return_slots())
        }
        OperandType::MultiANewArray => {
            let dimensions = operands[2];
            if dimensions == 0 {
                return Err(malformed_error!(
                    "multianewarray at offset {} has zero dimensions",
                    offset
                ));
            }
            (u16::from(dimensions), 0)
        }
        _ => (0, 0),
    };

    Ok(OpaqueInstruction {
        opcode,
        wide: false,
        operands,
        stack: StackBehavior::new(
            u16::from(info.stack_pops) + extra_pops,
            u16::from(info.stack_pushes) + extra_pushes,
        ),
        flow: info.flow,
    })
}
