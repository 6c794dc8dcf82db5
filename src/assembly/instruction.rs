//! Instruction model for JVM bytecode.
//!
//! This module defines the closed [`Instruction`] enum the optimizer works on, together with
//! the small value types it is built from. Instructions that take part in folding get a
//! dedicated variant carrying decoded operands; everything else is kept as an
//! [`OpaqueInstruction`] with its raw operand bytes and precomputed stack behaviour, so it
//! can be written back unchanged.
//!
//! # Key Types
//!
//! - [`Instruction`] - One decoded instruction
//! - [`TypeTag`] - Primitive type of a stack value or local variable
//! - [`NumericValue`] - A literal numeric value together with its width
//! - [`ArithmeticOp`], [`CompareKind`], [`Condition`], [`Relation`] - Operator families
//! - [`FlowType`], [`StackBehavior`] - Control flow and stack effect classification
//!
//! Branch targets are [`crate::assembly::InstructionHandle`]s into the owning
//! [`crate::assembly::InstructionList`], never byte offsets. Offsets only exist while a code
//! array is decoded or encoded.
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{ArithmeticOp, Instruction, NumericValue, TypeTag};
//!
//! let push = Instruction::int_const(7);
//! assert!(matches!(push, Instruction::ConstPush { value: NumericValue::I32(7), ty: TypeTag::Int }));
//!
//! let add = Instruction::Arithmetic { op: ArithmeticOp::Add, ty: TypeTag::Long };
//! assert_eq!(add.mnemonic(), "ladd");
//! assert_eq!(add.to_string(), "ladd");
//! ```

use std::fmt;

use strum::{Display, EnumCount, EnumIter};

use crate::assembly::{instructions::INSTRUCTIONS, opcodes, InstructionHandle};

/// Primitive type of a value on the operand stack or in a local variable.
///
/// The `Display` form is the field descriptor letter (`I`, `J`, `F`, ...).
/// `byte`, `short` and `char` values live on the stack as `int`; see [`TypeTag::promote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
pub enum TypeTag {
    /// 8-bit signed integer, pushed by `bipush`
    #[strum(serialize = "B")]
    Byte,
    /// 16-bit unsigned character
    #[strum(serialize = "C")]
    Char,
    /// 16-bit signed integer, pushed by `sipush`
    #[strum(serialize = "S")]
    Short,
    /// 32-bit signed integer
    #[strum(serialize = "I")]
    Int,
    /// 64-bit signed integer
    #[strum(serialize = "J")]
    Long,
    /// 32-bit IEEE 754 float
    #[strum(serialize = "F")]
    Float,
    /// 64-bit IEEE 754 float
    #[strum(serialize = "D")]
    Double,
    /// Object or array reference (and `jsr` return addresses)
    #[strum(serialize = "L")]
    Reference,
}

impl TypeTag {
    /// Returns the type a value of this type has on the operand stack.
    ///
    /// `byte`, `short` and `char` promote to `int`; every other type is unchanged.
    #[must_use]
    pub fn promote(self) -> TypeTag {
        match self {
            TypeTag::Byte | TypeTag::Short | TypeTag::Char => TypeTag::Int,
            other => other,
        }
    }

    /// Number of stack or local variable slots a value of this type occupies.
    #[must_use]
    pub fn slots(self) -> u16 {
        match self {
            TypeTag::Long | TypeTag::Double => 2,
            _ => 1,
        }
    }

    /// Returns `true` for `long` and `double`, which are loaded with `ldc2_w`.
    #[must_use]
    pub fn is_wide(self) -> bool {
        self.slots() == 2
    }

    /// Returns `true` for the integral types.
    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeTag::Byte | TypeTag::Char | TypeTag::Short | TypeTag::Int | TypeTag::Long
        )
    }

    /// Returns `true` for `float` and `double`.
    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(self, TypeTag::Float | TypeTag::Double)
    }

    /// The mnemonic prefix used by typed opcodes (`i`, `l`, `f`, `d`, `a`).
    #[must_use]
    pub fn prefix(self) -> char {
        match self.promote() {
            TypeTag::Long => 'l',
            TypeTag::Float => 'f',
            TypeTag::Double => 'd',
            TypeTag::Reference => 'a',
            _ => 'i',
        }
    }
}

/// A literal numeric value.
///
/// Equality compares floating point values by their bit pattern, so `NaN == NaN` and
/// `0.0 != -0.0`. This matches how the constant pool stores them.
#[derive(Debug, Clone, Copy)]
pub enum NumericValue {
    /// `int` value (also used for `byte`, `short` and `char`)
    I32(i32),
    /// `long` value
    I64(i64),
    /// `float` value
    F32(f32),
    /// `double` value
    F64(f64),
}

impl NumericValue {
    /// The natural stack type of this value.
    #[must_use]
    pub fn natural_type(&self) -> TypeTag {
        match self {
            NumericValue::I32(_) => TypeTag::Int,
            NumericValue::I64(_) => TypeTag::Long,
            NumericValue::F32(_) => TypeTag::Float,
            NumericValue::F64(_) => TypeTag::Double,
        }
    }
}

impl PartialEq for NumericValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NumericValue::I32(a), NumericValue::I32(b)) => a == b,
            (NumericValue::I64(a), NumericValue::I64(b)) => a == b,
            (NumericValue::F32(a), NumericValue::F32(b)) => a.to_bits() == b.to_bits(),
            (NumericValue::F64(a), NumericValue::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::I32(v) => write!(f, "{v}"),
            NumericValue::I64(v) => write!(f, "{v}L"),
            NumericValue::F32(v) => write!(f, "{v}F"),
            NumericValue::F64(v) => write!(f, "{v}D"),
        }
    }
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum ArithmeticOp {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `mul`
    Mul,
    /// `div`
    Div,
    /// `rem`
    Rem,
    /// `shl`
    Shl,
    /// `shr`
    Shr,
    /// `ushr`
    Ushr,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
}

impl ArithmeticOp {
    /// Mnemonic without the type prefix (`add`, `shl`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Mul => "mul",
            ArithmeticOp::Div => "div",
            ArithmeticOp::Rem => "rem",
            ArithmeticOp::Shl => "shl",
            ArithmeticOp::Shr => "shr",
            ArithmeticOp::Ushr => "ushr",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Xor => "xor",
        }
    }

    /// Returns `true` for `shl`, `shr` and `ushr`, whose right operand is always an `int`.
    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(self, ArithmeticOp::Shl | ArithmeticOp::Shr | ArithmeticOp::Ushr)
    }

    /// Returns `true` for the operators that only exist for integral types.
    #[must_use]
    pub fn is_bitwise(self) -> bool {
        self.is_shift() || matches!(self, ArithmeticOp::And | ArithmeticOp::Or | ArithmeticOp::Xor)
    }
}

/// The `lcmp`/`fcmp<op>`/`dcmp<op>` family.
///
/// These push `-1`, `0` or `1`. The `L` and `G` variants differ only in what they push when
/// either operand is NaN: `-1` and `1` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum CompareKind {
    /// `lcmp`
    Lcmp,
    /// `fcmpl`
    FcmpL,
    /// `fcmpg`
    FcmpG,
    /// `dcmpl`
    DcmpL,
    /// `dcmpg`
    DcmpG,
}

impl CompareKind {
    /// Type both operands are compared in.
    #[must_use]
    pub fn operand_type(self) -> TypeTag {
        match self {
            CompareKind::Lcmp => TypeTag::Long,
            CompareKind::FcmpL | CompareKind::FcmpG => TypeTag::Float,
            CompareKind::DcmpL | CompareKind::DcmpG => TypeTag::Double,
        }
    }

    /// Result pushed when the operands are unordered (either is NaN).
    #[must_use]
    pub fn nan_result(self) -> i32 {
        match self {
            CompareKind::FcmpG | CompareKind::DcmpG => 1,
            _ => -1,
        }
    }

    /// The mnemonic of this comparison.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            CompareKind::Lcmp => "lcmp",
            CompareKind::FcmpL => "fcmpl",
            CompareKind::FcmpG => "fcmpg",
            CompareKind::DcmpL => "dcmpl",
            CompareKind::DcmpG => "dcmpg",
        }
    }
}

/// Relation tested by a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum Relation {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
}

impl Relation {
    /// Mnemonic suffix (`eq`, `ne`, ...).
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Relation::Eq => "eq",
            Relation::Ne => "ne",
            Relation::Lt => "lt",
            Relation::Ge => "ge",
            Relation::Gt => "gt",
            Relation::Le => "le",
        }
    }
}

/// What a conditional branch tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// `if<rel>`: compare one `int` against zero
    Zero(Relation),
    /// `if_icmp<rel>`: compare two `int`s
    IntCompare(Relation),
    /// `if_acmpeq`
    RefEqual,
    /// `if_acmpne`
    RefNotEqual,
    /// `ifnull`
    Null,
    /// `ifnonnull`
    NonNull,
}

impl Condition {
    /// Number of stack operands the branch consumes.
    #[must_use]
    pub fn operand_count(self) -> u16 {
        match self {
            Condition::Zero(_) | Condition::Null | Condition::NonNull => 1,
            Condition::IntCompare(_) | Condition::RefEqual | Condition::RefNotEqual => 2,
        }
    }

    /// Returns `true` for branches on object references.
    #[must_use]
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            Condition::RefEqual | Condition::RefNotEqual | Condition::Null | Condition::NonNull
        )
    }

    /// The opcode byte of this branch.
    #[must_use]
    pub fn opcode(self) -> u8 {
        let relation_index = |relation: Relation| match relation {
            Relation::Eq => 0,
            Relation::Ne => 1,
            Relation::Lt => 2,
            Relation::Ge => 3,
            Relation::Gt => 4,
            Relation::Le => 5,
        };

        match self {
            Condition::Zero(relation) => opcodes::IFEQ + relation_index(relation),
            Condition::IntCompare(relation) => opcodes::IF_ICMPEQ + relation_index(relation),
            Condition::RefEqual => opcodes::IF_ACMPEQ,
            Condition::RefNotEqual => opcodes::IF_ACMPNE,
            Condition::Null => opcodes::IFNULL,
            Condition::NonNull => opcodes::IFNONNULL,
        }
    }
}

/// Encoding of a multi-way branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchKind {
    /// `tableswitch`: keys are consecutive
    Table,
    /// `lookupswitch`: keys are sorted
    Lookup,
}

/// How an instruction affects control flow.
///
/// # Examples
///
/// ```rust
/// use classfold::assembly::{FlowType, Instruction};
///
/// assert_eq!(Instruction::int_const(1).flow_type(), FlowType::Sequential);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// Jump to a subroutine (`jsr`), pushing a return address
    Subroutine,
    /// Return from a subroutine (`ret`)
    SubroutineReturn,
}

/// Stack effect of an instruction, counted in slots.
///
/// `long` and `double` values take two slots, everything else one. This is the unit the
/// class file's `max_stack` is expressed in.
///
/// # Examples
///
/// ```rust
/// use classfold::assembly::StackBehavior;
///
/// // ladd: two longs in, one long out
/// let ladd = StackBehavior::new(4, 2);
/// assert_eq!(ladd.net_effect, -2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StackBehavior {
    /// Number of slots popped from stack
    pub pops: u16,
    /// Number of slots pushed to stack
    pub pushes: u16,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i32,
}

impl StackBehavior {
    /// Creates a stack behaviour from pop and push counts.
    #[must_use]
    pub fn new(pops: u16, pushes: u16) -> Self {
        StackBehavior {
            pops,
            pushes,
            net_effect: i32::from(pushes) - i32::from(pops),
        }
    }
}

/// An instruction the optimizer never inspects.
///
/// The operand bytes are kept exactly as decoded, so none of these may encode a bytecode
/// offset: branches, `jsr` and switches always decode to their own [`Instruction`] variants.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueInstruction {
    /// Opcode byte
    pub opcode: u8,
    /// Whether the opcode was preceded by `wide` (only `ret` can be)
    pub wide: bool,
    /// Raw operand bytes following the opcode
    pub operands: Vec<u8>,
    /// Stack effect, resolved against the constant pool where needed
    pub stack: StackBehavior,
    /// Control flow classification
    pub flow: FlowType,
}

impl OpaqueInstruction {
    /// Creates an opaque instruction with no operands, taking stack and flow from the opcode table.
    ///
    /// Returns `None` for opcodes whose stack effect depends on the constant pool, or that
    /// carry operands.
    #[must_use]
    pub fn simple(opcode: u8) -> Option<Self> {
        let info = INSTRUCTIONS.get(usize::from(opcode))?;
        if info.op_type.has_operands() {
            return None;
        }

        Some(OpaqueInstruction {
            opcode,
            wide: false,
            operands: Vec::new(),
            stack: StackBehavior::new(u16::from(info.stack_pops), u16::from(info.stack_pushes)),
            flow: info.flow,
        })
    }

    /// The local variable slot read by `ret`, if this is one.
    #[must_use]
    pub fn ret_slot(&self) -> Option<u16> {
        if self.opcode != opcodes::RET {
            return None;
        }

        match self.operands.as_slice() {
            [slot] => Some(u16::from(*slot)),
            [high, low] => Some(u16::from_be_bytes([*high, *low])),
            _ => None,
        }
    }
}

/// A decoded JVM instruction.
///
/// Every opcode the folding engine reasons about has its own variant. Loads and stores
/// collapse their `_0`..`_3`, plain and `wide` forms into one variant; the encoder picks the
/// shortest form again. Likewise `goto`/`goto_w` and `ldc`/`ldc_w` are a single variant
/// each.
///
/// # Examples
///
/// ```rust
/// use classfold::assembly::{Instruction, TypeTag};
///
/// let load = Instruction::Load { slot: 2, ty: TypeTag::Double };
/// assert_eq!(load.to_string(), "dload 2");
/// assert_eq!(load.local_slot(), Some((2, 2)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `iconst_*`, `lconst_*`, `fconst_*`, `dconst_*`, `bipush`, `sipush`
    ///
    /// `ty` is [`TypeTag::Byte`] for `bipush` and [`TypeTag::Short`] for `sipush`.
    ConstPush {
        /// The pushed value
        value: NumericValue,
        /// Declared type of the push
        ty: TypeTag,
    },
    /// `ldc`, `ldc_w` (narrow) or `ldc2_w` (wide)
    PoolLoad {
        /// Constant pool index
        index: u16,
        /// `true` for `ldc2_w`
        wide: bool,
    },
    /// `<t>load`
    Load {
        /// Local variable slot
        slot: u16,
        /// Type of the loaded value
        ty: TypeTag,
    },
    /// `<t>store`
    Store {
        /// Local variable slot
        slot: u16,
        /// Type of the stored value
        ty: TypeTag,
    },
    /// `i2l`, `d2f`, `i2b`, ...
    Convert {
        /// Source type
        from: TypeTag,
        /// Target type (`Byte`, `Char` or `Short` for the narrowing `int` conversions)
        to: TypeTag,
    },
    /// `<t>add`, `<t>shl`, ...
    Arithmetic {
        /// The operator
        op: ArithmeticOp,
        /// Type of the operation (and of the left operand)
        ty: TypeTag,
    },
    /// `lcmp`, `fcmpl`, `fcmpg`, `dcmpl`, `dcmpg`
    Compare(CompareKind),
    /// Conditional branch
    If {
        /// What is tested
        condition: Condition,
        /// Where control goes when the test holds
        target: InstructionHandle,
    },
    /// `goto` or `goto_w`
    Goto {
        /// Branch target
        target: InstructionHandle,
    },
    /// `iinc`, possibly `wide`
    IncrementLocal {
        /// Local variable slot
        slot: u16,
        /// Signed increment
        amount: i16,
    },
    /// `invokevirtual`
    InvokeVirtual {
        /// Constant pool index of the `Methodref`
        index: u16,
    },
    /// `jsr` or `jsr_w`
    Jsr {
        /// Subroutine entry
        target: InstructionHandle,
    },
    /// `tableswitch` or `lookupswitch`
    Switch {
        /// Encoding used when written back
        kind: SwitchKind,
        /// Target when no key matches
        default: InstructionHandle,
        /// `(key, target)` pairs in ascending key order
        cases: Vec<(i32, InstructionHandle)>,
    },
    /// Any other instruction, kept verbatim
    Other(OpaqueInstruction),
}

impl Instruction {
    /// An `int` constant push (`iconst_*` family).
    #[must_use]
    pub fn int_const(value: i32) -> Self {
        Instruction::ConstPush {
            value: NumericValue::I32(value),
            ty: TypeTag::Int,
        }
    }

    /// A `nop`.
    #[must_use]
    pub fn nop() -> Self {
        Instruction::Other(OpaqueInstruction {
            opcode: opcodes::NOP,
            wide: false,
            operands: Vec::new(),
            stack: StackBehavior::default(),
            flow: FlowType::Sequential,
        })
    }

    /// Returns the mnemonic of this instruction's family.
    ///
    /// Loads, stores and constant pushes report the general form (`iload`, `bipush`)
    /// regardless of which encoding the encoder will choose.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        let by_opcode = |opcode: u8| {
            INSTRUCTIONS
                .get(usize::from(opcode))
                .map_or("<unknown>", |info| info.instr)
        };

        match self {
            Instruction::ConstPush { value, ty } => match (ty, value) {
                (TypeTag::Byte, _) => "bipush",
                (TypeTag::Short, _) => "sipush",
                (_, NumericValue::I64(_)) => "lconst",
                (_, NumericValue::F32(_)) => "fconst",
                (_, NumericValue::F64(_)) => "dconst",
                _ => "iconst",
            },
            Instruction::PoolLoad { wide: true, .. } => "ldc2_w",
            Instruction::PoolLoad { index, .. } if *index > 0xFF => "ldc_w",
            Instruction::PoolLoad { .. } => "ldc",
            Instruction::Load { ty, .. } => by_opcode(typed_opcode(opcodes::ILOAD, *ty)),
            Instruction::Store { ty, .. } => by_opcode(typed_opcode(opcodes::ISTORE, *ty)),
            Instruction::Convert { from, to } => by_opcode(convert_opcode(*from, *to)),
            Instruction::Arithmetic { op, ty } => by_opcode(arithmetic_opcode(*op, *ty)),
            Instruction::Compare(kind) => kind.mnemonic(),
            Instruction::If { condition, .. } => by_opcode(condition.opcode()),
            Instruction::Goto { .. } => "goto",
            Instruction::IncrementLocal { .. } => "iinc",
            Instruction::InvokeVirtual { .. } => "invokevirtual",
            Instruction::Jsr { .. } => "jsr",
            Instruction::Switch {
                kind: SwitchKind::Table,
                ..
            } => "tableswitch",
            Instruction::Switch {
                kind: SwitchKind::Lookup,
                ..
            } => "lookupswitch",
            Instruction::Other(opaque) => by_opcode(opaque.opcode),
        }
    }

    /// Returns how this instruction affects control flow.
    #[must_use]
    pub fn flow_type(&self) -> FlowType {
        match self {
            Instruction::If { .. } => FlowType::ConditionalBranch,
            Instruction::Goto { .. } => FlowType::UnconditionalBranch,
            Instruction::InvokeVirtual { .. } => FlowType::Call,
            Instruction::Jsr { .. } => FlowType::Subroutine,
            Instruction::Switch { .. } => FlowType::Switch,
            Instruction::Other(opaque) => opaque.flow,
            _ => FlowType::Sequential,
        }
    }

    /// All handles this instruction branches to.
    #[must_use]
    pub fn targets(&self) -> Vec<InstructionHandle> {
        match self {
            Instruction::If { target, .. }
            | Instruction::Goto { target }
            | Instruction::Jsr { target } => vec![*target],
            Instruction::Switch { default, cases, .. } => std::iter::once(*default)
                .chain(cases.iter().map(|(_, target)| *target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Mutable references to every branch target of this instruction.
    pub fn targets_mut(&mut self) -> Vec<&mut InstructionHandle> {
        match self {
            Instruction::If { target, .. }
            | Instruction::Goto { target }
            | Instruction::Jsr { target } => vec![target],
            Instruction::Switch { default, cases, .. } => std::iter::once(default)
                .chain(cases.iter_mut().map(|(_, target)| target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if this instruction refers to `handle` as a branch target.
    #[must_use]
    pub fn branches_to(&self, handle: InstructionHandle) -> bool {
        match self {
            Instruction::If { target, .. }
            | Instruction::Goto { target }
            | Instruction::Jsr { target } => *target == handle,
            Instruction::Switch { default, cases, .. } => {
                *default == handle || cases.iter().any(|(_, target)| *target == handle)
            }
            _ => false,
        }
    }

    /// The local variable slot this instruction touches and the number of slots it spans.
    #[must_use]
    pub fn local_slot(&self) -> Option<(u16, u16)> {
        match self {
            Instruction::Load { slot, ty } | Instruction::Store { slot, ty } => {
                Some((*slot, ty.slots()))
            }
            Instruction::IncrementLocal { slot, .. } => Some((*slot, 1)),
            Instruction::Other(opaque) => opaque.ret_slot().map(|slot| (slot, 1)),
            _ => None,
        }
    }

    /// Stack effect of this instruction when it does not depend on the constant pool.
    ///
    /// Returns `None` for `invokevirtual`, whose effect comes from its method descriptor.
    #[must_use]
    pub fn fixed_stack_behavior(&self) -> Option<StackBehavior> {
        let behavior = match self {
            Instruction::ConstPush { value, .. } => {
                StackBehavior::new(0, value.natural_type().slots())
            }
            Instruction::PoolLoad { wide, .. } => StackBehavior::new(0, if *wide { 2 } else { 1 }),
            Instruction::Load { ty, .. } => StackBehavior::new(0, ty.slots()),
            Instruction::Store { ty, .. } => StackBehavior::new(ty.slots(), 0),
            Instruction::Convert { from, to } => StackBehavior::new(from.slots(), to.slots()),
            Instruction::Arithmetic { op, ty } => {
                let right = if op.is_shift() { 1 } else { ty.slots() };
                StackBehavior::new(ty.slots() + right, ty.slots())
            }
            Instruction::Compare(kind) => StackBehavior::new(kind.operand_type().slots() * 2, 1),
            Instruction::If { condition, .. } => StackBehavior::new(condition.operand_count(), 0),
            Instruction::Goto { .. } | Instruction::IncrementLocal { .. } => {
                StackBehavior::default()
            }
            Instruction::Jsr { .. } => StackBehavior::new(0, 1),
            Instruction::Switch { .. } => StackBehavior::new(1, 0),
            Instruction::InvokeVirtual { .. } => return None,
            Instruction::Other(opaque) => opaque.stack,
        };

        Some(behavior)
    }

    /// Returns `true` if execution can continue with the next instruction in sequence.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        !matches!(
            self.flow_type(),
            FlowType::UnconditionalBranch
                | FlowType::Return
                | FlowType::Switch
                | FlowType::Throw
                | FlowType::SubroutineReturn
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.mnemonic();
        match self {
            Instruction::ConstPush { value, .. } => write!(f, "{mnemonic} {value}"),
            Instruction::PoolLoad { index, .. } | Instruction::InvokeVirtual { index } => {
                write!(f, "{mnemonic} #{index}")
            }
            Instruction::Load { slot, .. } | Instruction::Store { slot, .. } => {
                write!(f, "{mnemonic} {slot}")
            }
            Instruction::IncrementLocal { slot, amount } => write!(f, "{mnemonic} {slot} {amount}"),
            Instruction::If { target, .. }
            | Instruction::Goto { target }
            | Instruction::Jsr { target } => write!(f, "{mnemonic} {target}"),
            Instruction::Switch { default, cases, .. } => {
                write!(f, "{mnemonic} ({} cases) default {default}", cases.len())
            }
            _ => f.write_str(mnemonic),
        }
    }
}

/// Opcode of the `int` variant of a typed family, shifted to `ty`.
///
/// Works for every family laid out in `i`, `l`, `f`, `d`, `a` order (loads, stores, returns).
pub(crate) fn typed_opcode(int_opcode: u8, ty: TypeTag) -> u8 {
    let offset = match ty.promote() {
        TypeTag::Long => 1,
        TypeTag::Float => 2,
        TypeTag::Double => 3,
        TypeTag::Reference => 4,
        _ => 0,
    };
    int_opcode + offset
}

/// Opcode of an arithmetic instruction.
pub(crate) fn arithmetic_opcode(op: ArithmeticOp, ty: TypeTag) -> u8 {
    let width = match ty.promote() {
        TypeTag::Long => 1,
        TypeTag::Float => 2,
        TypeTag::Double => 3,
        _ => 0,
    };

    // the bitwise families only have int and long variants
    let bitwise_width = width.min(1);
    match op {
        ArithmeticOp::Add => opcodes::IADD + width,
        ArithmeticOp::Sub => opcodes::ISUB + width,
        ArithmeticOp::Mul => opcodes::IMUL + width,
        ArithmeticOp::Div => opcodes::IDIV + width,
        ArithmeticOp::Rem => opcodes::IREM + width,
        ArithmeticOp::Shl => opcodes::ISHL + bitwise_width,
        ArithmeticOp::Shr => opcodes::ISHR + bitwise_width,
        ArithmeticOp::Ushr => opcodes::IUSHR + bitwise_width,
        ArithmeticOp::And => opcodes::IAND + bitwise_width,
        ArithmeticOp::Or => opcodes::IOR + bitwise_width,
        ArithmeticOp::Xor => opcodes::IXOR + bitwise_width,
    }
}

/// Opcode of a conversion, or `NOP` for pairs the instruction set has no opcode for.
pub(crate) fn convert_opcode(from: TypeTag, to: TypeTag) -> u8 {
    match (from.promote(), to) {
        (TypeTag::Int, TypeTag::Long) => opcodes::I2L,
        (TypeTag::Int, TypeTag::Float) => opcodes::I2F,
        (TypeTag::Int, TypeTag::Double) => opcodes::I2D,
        (TypeTag::Long, TypeTag::Int) => opcodes::L2I,
        (TypeTag::Long, TypeTag::Float) => opcodes::L2F,
        (TypeTag::Long, TypeTag::Double) => opcodes::L2D,
        (TypeTag::Float, TypeTag::Int) => opcodes::F2I,
        (TypeTag::Float, TypeTag::Long) => opcodes::F2L,
        (TypeTag::Float, TypeTag::Double) => opcodes::F2D,
        (TypeTag::Double, TypeTag::Int) => opcodes::D2I,
        (TypeTag::Double, TypeTag::Long) => opcodes::D2L,
        (TypeTag::Double, TypeTag::Float) => opcodes::D2F,
        (TypeTag::Int, TypeTag::Byte) => opcodes::I2B,
        (TypeTag::Int, TypeTag::Char) => opcodes::I2C,
        (TypeTag::Int, TypeTag::Short) => opcodes::I2S,
        _ => opcodes::NOP,
    }
}
