// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # classfold
//!
//! A static constant-folding pass for JVM class file bytecode. `classfold` finds arithmetic
//! and boolean comparisons whose operands are compile-time literals, evaluates them with JVM
//! semantics and rewrites the bytecode in place, keeping every branch and exception handler
//! target intact.
//!
//! ## Features
//!
//! - **🔢 Arithmetic folding** - `int`, `long`, `float` and `double` operations, with the
//!   JVM's binary numeric promotion, shift masking and conversions
//! - **⚖️ Comparison folding** - `if_icmp<cond>` and `lcmp`/`fcmp<op>`/`dcmp<op>` followed by
//!   `if<cond>` collapse into the constant `0`/`1` they materialize
//! - **📍 Local variable tracking** - loads are traced back to the literal last stored into
//!   the variable on the straight-line path in front of them
//! - **🔁 Loop safe** - operations feeding a loop's `iinc`/`goto` tail are left alone
//! - **🧾 Event log** - every fold, skip and abort is recorded with its bytecode offset
//!
//! ## Quick Start
//!
//! ```rust
//! use classfold::prelude::*;
//!
//! let mut class = ClassModel::new("demo/Area");
//! // iconst_2 iconst_3 imul ireturn
//! class.methods.push(
//!     Method::new("area", "()I", MethodAccessFlags::STATIC)
//!         .with_code(Code::new(2, 0, vec![0x05, 0x06, 0x68, 0xAC])),
//! );
//!
//! let optimized = optimize_class(&class)?;
//! let code = optimized.methods[0].code.as_ref().unwrap();
//!
//! // ldc #1 ireturn, with #1 = int 6
//! assert_eq!(code.code, vec![0x12, 0x01, 0xAC]);
//! assert_eq!(optimized.constant_pool.numeric(1)?, NumericValue::I32(6));
//! # Ok::<(), classfold::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`metadata`] - Class model: constant pool, descriptors, methods and `Code` attributes
//! - [`assembly`] - Instruction model, bytecode decoder/encoder, stack analysis
//! - [`optimizer`] - Fold passes, method and class drivers, event log
//! - [`file`] - Big-endian byte cursor the codec is built on
//! - [`Error`] and [`Result`] - Error handling
//!
//! Reading and writing whole `.class` files is left to the caller: a [`metadata::ClassModel`]
//! holds exactly what the optimizer needs and nothing else.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Errors are classified by how far
//! they propagate:
//!
//! ```rust
//! use classfold::{Error, metadata::ClassModel, optimize_class};
//!
//! match optimize_class(&ClassModel::new("demo/Empty")) {
//!     Ok(class) => println!("{} methods", class.methods.len()),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use classfold::prelude::*;
///
/// let optimizer = Optimizer::new(OptimizerConfig::default().with_max_iterations(100));
/// let optimized = optimizer.optimize_class(&ClassModel::new("demo/Empty"))?;
/// assert!(optimized.methods.is_empty());
/// # Ok::<(), classfold::Error>(())
/// ```
pub mod prelude;

/// Bytecode instructions and the method code codec.
///
/// This module provides:
///
/// - **Instruction model**: [`assembly::Instruction`], a closed enum over the opcode
///   families the optimizer rewrites, with everything else carried as opaque bytes
/// - **Instruction stream**: [`assembly::InstructionList`] with stable handles that branch
///   instructions and exception handlers refer to
/// - **Codec**: [`assembly::decode_code`] and [`assembly::encode_code`], including `wide`
///   forms, switch padding and `goto_w` widening
/// - **Stack analysis**: [`assembly::max_stack`] and [`assembly::max_locals`]
///
/// # Example
///
/// ```rust
/// use classfold::assembly::{decode_code, encode_code};
/// use classfold::metadata::{Code, ConstantPool};
///
/// // bipush 10 istore_1 iload_1 ireturn
/// let code = Code::new(1, 2, vec![0x10, 10, 0x3C, 0x1B, 0xAC]);
/// let mut list = decode_code(&code, &ConstantPool::new())?;
/// assert_eq!(list.len(), 4);
///
/// let (bytes, handlers) = encode_code(&mut list)?;
/// assert_eq!(bytes, code.code);
/// assert!(handlers.is_empty());
/// # Ok::<(), classfold::Error>(())
/// ```
pub mod assembly;

/// Byte-level primitives: the [`Parser`] cursor and big-endian read/write helpers.
pub mod file;

/// The class model the optimizer works on.
///
/// Provides [`metadata::ClassModel`], [`metadata::Method`] with its [`metadata::Code`]
/// attribute, the [`metadata::ConstantPool`] and descriptor parsing.
pub mod metadata;

/// Constant folding passes and the drivers that run them.
///
/// See [`optimizer::Optimizer`] for the main entry point.
pub mod optimizer;

/// `classfold` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `classfold` Error type
///
/// The main error type for all operations in this crate. See [`Error::is_recoverable`] and
/// [`Error::is_method_local`] for how far each kind propagates.
pub use error::Error;

/// Bounds-checked big-endian cursor over a byte slice.
///
/// # Example
///
/// ```rust
/// use classfold::Parser;
///
/// let mut parser = Parser::new(&[0x00, 0x2A, 0xCA, 0xFE]);
/// assert_eq!(parser.read_be::<u16>()?, 42);
/// assert_eq!(parser.read_be::<u16>()?, 0xCAFE);
/// # Ok::<(), classfold::Error>(())
/// ```
pub use file::Parser;

/// Optimizes a class with the default configuration.
///
/// See [`optimizer::Optimizer`] for configuration and access to the event log.
pub use optimizer::optimize_class;
