//! Static per-opcode metadata for the JVM instruction set.
//!
//! [`INSTRUCTIONS`] is indexed by opcode byte and covers `0x00` (`nop`) through `0xC9`
//! (`jsr_w`). Every entry names the mnemonic, the operand layout, the fixed part of the
//! stack effect (in slots) and the control flow classification. The decoder drives operand
//! parsing from [`OperandType`]; the stack analysis uses the pop/push counts for every
//! instruction kept opaque.
//!
//! Field access, invocations and `multianewarray` have a stack effect that depends on the
//! constant pool or on their operands. For those the table only holds the fixed part (the
//! receiver, for instance); the decoder adds the rest.

use crate::assembly::FlowType;

/// Layout of the operand bytes following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand
    None,
    /// Signed byte (`bipush`)
    Int8,
    /// Signed short (`sipush`)
    Int16,
    /// Unsigned byte local variable index, `u16` after `wide`
    Local,
    /// Unsigned byte constant pool index (`ldc`)
    PoolIndex8,
    /// Unsigned short constant pool index
    PoolIndex16,
    /// Constant pool index of a field reference
    FieldRef,
    /// Constant pool index of a method reference
    MethodRef,
    /// `invokeinterface`: pool index, count, zero byte
    InvokeInterface,
    /// `invokedynamic`: pool index, two zero bytes
    InvokeDynamic,
    /// `multianewarray`: pool index, dimensions
    MultiANewArray,
    /// `newarray`: primitive array type code
    ArrayType,
    /// `iinc`: local index and signed byte increment, both widened after `wide`
    Iinc,
    /// Signed 16-bit branch offset
    Branch16,
    /// Signed 32-bit branch offset
    Branch32,
    /// `tableswitch` operands, after padding
    TableSwitch,
    /// `lookupswitch` operands, after padding
    LookupSwitch,
    /// The `wide` prefix
    Wide,
}

impl OperandType {
    /// Returns `true` unless the opcode is a single byte.
    #[must_use]
    pub fn has_operands(self) -> bool {
        self != OperandType::None
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct JvmInstruction {
    /// Mnemonic
    pub instr: &'static str,
    /// Operand layout
    pub op_type: OperandType,
    /// Fixed number of slots popped
    pub stack_pops: u8,
    /// Fixed number of slots pushed
    pub stack_pushes: u8,
    /// Control flow classification
    pub flow: FlowType,
}

const fn op(
    instr: &'static str,
    op_type: OperandType,
    stack_pops: u8,
    stack_pushes: u8,
    flow: FlowType,
) -> JvmInstruction {
    JvmInstruction {
        instr,
        op_type,
        stack_pops,
        stack_pushes,
        flow,
    }
}

use FlowType::{
    Call, ConditionalBranch as Cond, Return as Ret, Sequential as Seq, Subroutine,
    SubroutineReturn, Switch, Throw, UnconditionalBranch as Jump,
};
use OperandType::{
    ArrayType, Branch16, Branch32, FieldRef, Iinc, Int16, Int8, InvokeDynamic, InvokeInterface,
    Local, LookupSwitch, MethodRef, MultiANewArray, None, PoolIndex16, PoolIndex8, TableSwitch,
    Wide,
};

/// Opcode table, indexed by opcode byte.
pub const INSTRUCTIONS: [JvmInstruction; 202] = [
    // 0x00
    op("nop", None, 0, 0, Seq),
    op("aconst_null", None, 0, 1, Seq),
    op("iconst_m1", None, 0, 1, Seq),
    op("iconst_0", None, 0, 1, Seq),
    op("iconst_1", None, 0, 1, Seq),
    op("iconst_2", None, 0, 1, Seq),
    op("iconst_3", None, 0, 1, Seq),
    op("iconst_4", None, 0, 1, Seq),
    op("iconst_5", None, 0, 1, Seq),
    op("lconst_0", None, 0, 2, Seq),
    op("lconst_1", None, 0, 2, Seq),
    op("fconst_0", None, 0, 1, Seq),
    op("fconst_1", None, 0, 1, Seq),
    op("fconst_2", None, 0, 1, Seq),
    op("dconst_0", None, 0, 2, Seq),
    op("dconst_1", None, 0, 2, Seq),
    // 0x10
    op("bipush", Int8, 0, 1, Seq),
    op("sipush", Int16, 0, 1, Seq),
    op("ldc", PoolIndex8, 0, 1, Seq),
    op("ldc_w", PoolIndex16, 0, 1, Seq),
    op("ldc2_w", PoolIndex16, 0, 2, Seq),
    op("iload", Local, 0, 1, Seq),
    op("lload", Local, 0, 2, Seq),
    op("fload", Local, 0, 1, Seq),
    op("dload", Local, 0, 2, Seq),
    op("aload", Local, 0, 1, Seq),
    op("iload_0", None, 0, 1, Seq),
    op("iload_1", None, 0, 1, Seq),
    op("iload_2", None, 0, 1, Seq),
    op("iload_3", None, 0, 1, Seq),
    op("lload_0", None, 0, 2, Seq),
    op("lload_1", None, 0, 2, Seq),
    // 0x20
    op("lload_2", None, 0, 2, Seq),
    op("lload_3", None, 0, 2, Seq),
    op("fload_0", None, 0, 1, Seq),
    op("fload_1", None, 0, 1, Seq),
    op("fload_2", None, 0, 1, Seq),
    op("fload_3", None, 0, 1, Seq),
    op("dload_0", None, 0, 2, Seq),
    op("dload_1", None, 0, 2, Seq),
    op("dload_2", None, 0, 2, Seq),
    op("dload_3", None, 0, 2, Seq),
    op("aload_0", None, 0, 1, Seq),
    op("aload_1", None, 0, 1, Seq),
    op("aload_2", None, 0, 1, Seq),
    op("aload_3", None, 0, 1, Seq),
    op("iaload", None, 2, 1, Seq),
    op("laload", None, 2, 2, Seq),
    // 0x30
    op("faload", None, 2, 1, Seq),
    op("daload", None, 2, 2, Seq),
    op("aaload", None, 2, 1, Seq),
    op("baload", None, 2, 1, Seq),
    op("caload", None, 2, 1, Seq),
    op("saload", None, 2, 1, Seq),
    op("istore", Local, 1, 0, Seq),
    op("lstore", Local, 2, 0, Seq),
    op("fstore", Local, 1, 0, Seq),
    op("dstore", Local, 2, 0, Seq),
    op("astore", Local, 1, 0, Seq),
    op("istore_0", None, 1, 0, Seq),
    op("istore_1", None, 1, 0, Seq),
    op("istore_2", None, 1, 0, Seq),
    op("istore_3", None, 1, 0, Seq),
    op("lstore_0", None, 2, 0, Seq),
    // 0x40
    op("lstore_1", None, 2, 0, Seq),
    op("lstore_2", None, 2, 0, Seq),
    op("lstore_3", None, 2, 0, Seq),
    op("fstore_0", None, 1, 0, Seq),
    op("fstore_1", None, 1, 0, Seq),
    op("fstore_2", None, 1, 0, Seq),
    op("fstore_3", None, 1, 0, Seq),
    op("dstore_0", None, 2, 0, Seq),
    op("dstore_1", None, 2, 0, Seq),
    op("dstore_2", None, 2, 0, Seq),
    op("dstore_3", None, 2, 0, Seq),
    op("astore_0", None, 1, 0, Seq),
    op("astore_1", None, 1, 0, Seq),
    op("astore_2", None, 1, 0, Seq),
    op("astore_3", None, 1, 0, Seq),
    op("iastore", None, 3, 0, Seq),
    // 0x50
    op("lastore", None, 4, 0, Seq),
    op("fastore", None, 3, 0, Seq),
    op("dastore", None, 4, 0, Seq),
    op("aastore", None, 3, 0, Seq),
    op("bastore", None, 3, 0, Seq),
    op("castore", None, 3, 0, Seq),
    op("sastore", None, 3, 0, Seq),
    op("pop", None, 1, 0, Seq),
    op("pop2", None, 2, 0, Seq),
    op("dup", None, 1, 2, Seq),
    op("dup_x1", None, 2, 3, Seq),
    op("dup_x2", None, 3, 4, Seq),
    op("dup2", None, 2, 4, Seq),
    op("dup2_x1", None, 3, 5, Seq),
    op("dup2_x2", None, 4, 6, Seq),
    op("swap", None, 2, 2, Seq),
    // 0x60
    op("iadd", None, 2, 1, Seq),
    op("ladd", None, 4, 2, Seq),
    op("fadd", None, 2, 1, Seq),
    op("dadd", None, 4, 2, Seq),
    op("isub", None, 2, 1, Seq),
    op("lsub", None, 4, 2, Seq),
    op("fsub", None, 2, 1, Seq),
    op("dsub", None, 4, 2, Seq),
    op("imul", None, 2, 1, Seq),
    op("lmul", None, 4, 2, Seq),
    op("fmul", None, 2, 1, Seq),
    op("dmul", None, 4, 2, Seq),
    op("idiv", None, 2, 1, Seq),
    op("ldiv", None, 4, 2, Seq),
    op("fdiv", None, 2, 1, Seq),
    op("ddiv", None, 4, 2, Seq),
    // 0x70
    op("irem", None, 2, 1, Seq),
    op("lrem", None, 4, 2, Seq),
    op("frem", None, 2, 1, Seq),
    op("drem", None, 4, 2, Seq),
    op("ineg", None, 1, 1, Seq),
    op("lneg", None, 2, 2, Seq),
    op("fneg", None, 1, 1, Seq),
    op("dneg", None, 2, 2, Seq),
    op("ishl", None, 2, 1, Seq),
    op("lshl", None, 3, 2, Seq),
    op("ishr", None, 2, 1, Seq),
    op("lshr", None, 3, 2, Seq),
    op("iushr", None, 2, 1, Seq),
    op("lushr", None, 3, 2, Seq),
    op("iand", None, 2, 1, Seq),
    op("land", None, 4, 2, Seq),
    // 0x80
    op("ior", None, 2, 1, Seq),
    op("lor", None, 4, 2, Seq),
    op("ixor", None, 2, 1, Seq),
    op("lxor", None, 4, 2, Seq),
    op("iinc", Iinc, 0, 0, Seq),
    op("i2l", None, 1, 2, Seq),
    op("i2f", None, 1, 1, Seq),
    op("i2d", None, 1, 2, Seq),
    op("l2i", None, 2, 1, Seq),
    op("l2f", None, 2, 1, Seq),
    op("l2d", None, 2, 2, Seq),
    op("f2i", None, 1, 1, Seq),
    op("f2l", None, 1, 2, Seq),
    op("f2d", None, 1, 2, Seq),
    op("d2i", None, 2, 1, Seq),
    op("d2l", None, 2, 2, Seq),
    // 0x90
    op("d2f", None, 2, 1, Seq),
    op("i2b", None, 1, 1, Seq),
    op("i2c", None, 1, 1, Seq),
    op("i2s", None, 1, 1, Seq),
    op("lcmp", None, 4, 1, Seq),
    op("fcmpl", None, 2, 1, Seq),
    op("fcmpg", None, 2, 1, Seq),
    op("dcmpl", None, 4, 1, Seq),
    op("dcmpg", None, 4, 1, Seq),
    op("ifeq", Branch16, 1, 0, Cond),
    op("ifne", Branch16, 1, 0, Cond),
    op("iflt", Branch16, 1, 0, Cond),
    op("ifge", Branch16, 1, 0, Cond),
    op("ifgt", Branch16, 1, 0, Cond),
    op("ifle", Branch16, 1, 0, Cond),
    op("if_icmpeq", Branch16, 2, 0, Cond),
    // 0xA0
    op("if_icmpne", Branch16, 2, 0, Cond),
    op("if_icmplt", Branch16, 2, 0, Cond),
    op("if_icmpge", Branch16, 2, 0, Cond),
    op("if_icmpgt", Branch16, 2, 0, Cond),
    op("if_icmple", Branch16, 2, 0, Cond),
    op("if_acmpeq", Branch16, 2, 0, Cond),
    op("if_acmpne", Branch16, 2, 0, Cond),
    op("goto", Branch16, 0, 0, Jump),
    op("jsr", Branch16, 0, 1, Subroutine),
    op("ret", Local, 0, 0, SubroutineReturn),
    op("tableswitch", TableSwitch, 1, 0, Switch),
    op("lookupswitch", LookupSwitch, 1, 0, Switch),
    op("ireturn", None, 1, 0, Ret),
    op("lreturn", None, 2, 0, Ret),
    op("freturn", None, 1, 0, Ret),
    op("dreturn", None, 2, 0, Ret),
    // 0xB0
    op("areturn", None, 1, 0, Ret),
    op("return", None, 0, 0, Ret),
    op("getstatic", FieldRef, 0, 0, Seq),
    op("putstatic", FieldRef, 0, 0, Seq),
    op("getfield", FieldRef, 1, 0, Seq),
    op("putfield", FieldRef, 1, 0, Seq),
    op("invokevirtual", MethodRef, 1, 0, Call),
    op("invokespecial", MethodRef, 1, 0, Call),
    op("invokestatic", MethodRef, 0, 0, Call),
    op("invokeinterface", InvokeInterface, 1, 0, Call),
    op("invokedynamic", InvokeDynamic, 0, 0, Call),
    op("new", PoolIndex16, 0, 1, Seq),
    op("newarray", ArrayType, 1, 1, Seq),
    op("anewarray", PoolIndex16, 1, 1, Seq),
    op("arraylength", None, 1, 1, Seq),
    op("athrow", None, 1, 0, Throw),
    // 0xC0
    op("checkcast", PoolIndex16, 1, 1, Seq),
    op("instanceof", PoolIndex16, 1, 1, Seq),
    op("monitorenter", None, 1, 0, Seq),
    op("monitorexit", None, 1, 0, Seq),
    op("wide", Wide, 0, 0, Seq),
    op("multianewarray", MultiANewArray, 0, 1, Seq),
    op("ifnull", Branch16, 1, 0, Cond),
    op("ifnonnull", Branch16, 1, 0, Cond),
    op("goto_w", Branch32, 0, 0, Jump),
    op("jsr_w", Branch32, 0, 1, Subroutine),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::opcodes;

    #[test]
    fn test_table_alignment() {
        let anchors = [
            (opcodes::NOP, "nop"),
            (opcodes::LDC2_W, "ldc2_w"),
            (opcodes::ALOAD_3, "aload_3"),
            (opcodes::ISTORE, "istore"),
            (opcodes::SASTORE, "sastore"),
            (opcodes::SWAP, "swap"),
            (opcodes::DREM, "drem"),
            (opcodes::IINC, "iinc"),
            (opcodes::I2S, "i2s"),
            (opcodes::DCMPG, "dcmpg"),
            (opcodes::IF_ACMPNE, "if_acmpne"),
            (opcodes::LOOKUPSWITCH, "lookupswitch"),
            (opcodes::RETURN, "return"),
            (opcodes::INVOKEDYNAMIC, "invokedynamic"),
            (opcodes::ATHROW, "athrow"),
            (opcodes::WIDE, "wide"),
            (opcodes::JSR_W, "jsr_w"),
        ];

        for (opcode, name) in anchors {
            assert_eq!(INSTRUCTIONS[usize::from(opcode)].instr, name);
        }
        assert_eq!(INSTRUCTIONS.len(), usize::from(opcodes::JSR_W) + 1);
    }

    #[test]
    fn test_branch_layouts() {
        for info in &INSTRUCTIONS {
            let branches = matches!(info.op_type, OperandType::Branch16 | OperandType::Branch32);
            let jumps = matches!(
                info.flow,
                FlowType::ConditionalBranch | FlowType::UnconditionalBranch | FlowType::Subroutine
            );
            assert_eq!(branches, jumps, "{}", info.instr);
        }
    }
}
