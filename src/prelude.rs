//! # classfold Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the classfold library. Import this module to get quick access to the essential
//! types for optimizing classes.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classfold operations
pub use crate::Error;

/// The result type used throughout classfold
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Optimizer, its configuration and the default-configuration shortcut
pub use crate::optimizer::{optimize_class, Optimizer, OptimizerConfig};

/// Diagnostics recorded while optimizing
pub use crate::optimizer::{DerivedStats, Event, EventKind, EventLog};

/// Low-level byte cursor
pub use crate::Parser;

// ================================================================================================
// Class Model
// ================================================================================================

/// Classes, methods and their code
pub use crate::metadata::{
    ClassAccessFlags, ClassModel, ClassVersion, Code, ExceptionTableEntry, Method,
    MethodAccessFlags,
};

/// Constant pool and descriptors
pub use crate::metadata::{ConstantPool, ConstantPoolEntry, FieldType, MethodDescriptor};

// ================================================================================================
// Instructions
// ================================================================================================

/// Instruction model
pub use crate::assembly::{
    ArithmeticOp, CompareKind, Condition, Instruction, NumericValue, Relation, TypeTag,
};

/// Instruction stream and codec
pub use crate::assembly::{
    decode_code, encode_code, max_locals, max_stack, InstructionHandle, InstructionList,
};

// ================================================================================================
// Passes
// ================================================================================================

/// Fold pass interface and the built-in passes
pub use crate::optimizer::{ArithmeticFold, ComparisonFold, FoldPass, MethodContext};
