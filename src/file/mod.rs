//! Byte-level access to method code arrays.
//!
//! The class file format is big-endian throughout. This module holds the small set of
//! primitives the bytecode decoder and encoder are built on.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser`] - Bounds-checked cursor used by the decoder
//! - [`crate::file::io`] - The [`crate::file::io::ClassIO`] trait and free read/write helpers
//!
//! Whole class files are never read or written here: callers construct
//! [`crate::metadata::ClassModel`] values themselves and hand them to the optimizer.

pub mod io;
pub mod parser;

pub use parser::Parser;
