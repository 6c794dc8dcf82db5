//! JVM bytecode model, codec and stack analysis.
//!
//! This module turns the code array of a method into a mutable, handle-addressed
//! [`InstructionList`] and back. Everything the optimizer rewrites goes through here.
//!
//! # Architecture
//!
//! - **Instruction model**: [`Instruction`] is a closed enum over the opcode families the
//!   folding engine reasons about, with [`OpaqueInstruction`] carrying every other opcode
//!   verbatim
//! - **Stream**: [`InstructionList`] keeps instructions in order behind stable
//!   [`InstructionHandle`]s; branches and exception handlers point at handles
//! - **Codec**: [`decode_code`] resolves offsets to handles, [`encode_code`] lays the stream
//!   out again, widening `goto`/`jsr` when needed
//! - **Analysis**: [`max_stack`] and [`max_locals`] recompute the `Code` attribute counters
//!
//! # Key Components
//!
//! - [`crate::assembly::opcodes`] - Raw opcode byte constants
//! - [`crate::assembly::instructions`] - Static per-opcode table
//! - [`InstructionEncoder`] - Compact-form instruction emitter
//!
//! # Examples
//!
//! ```rust
//! use classfold::assembly::{decode_code, encode_code, max_stack};
//! use classfold::metadata::{Code, ConstantPool};
//!
//! // iload_0, iload_1, iadd, ireturn
//! let code = Code::new(2, 2, vec![0x1A, 0x1B, 0x60, 0xAC]);
//! let pool = ConstantPool::new();
//!
//! let mut list = decode_code(&code, &pool)?;
//! assert_eq!(max_stack(&list, &pool)?, 2);
//!
//! let (bytes, _) = encode_code(&mut list)?;
//! assert_eq!(bytes, code.code);
//! # Ok::<(), classfold::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
pub mod instructions;
mod list;
pub mod opcodes;
mod stack;

pub use decoder::decode_code;
pub use encoder::{encode_code, InstructionEncoder};
pub use instruction::{
    ArithmeticOp, CompareKind, Condition, FlowType, Instruction, NumericValue,
    OpaqueInstruction, Relation, StackBehavior, SwitchKind, TypeTag,
};
pub use list::{ExceptionHandler, InstructionHandle, InstructionList, Iter, Targeter};
pub use stack::{max_locals, max_stack, stack_behavior};
