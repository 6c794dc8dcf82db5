//! In-memory model of the parts of a class file the optimizer reads and rewrites.
//!
//! This module holds the container types callers build and receive back: the class, its
//! methods and their `Code` attributes, the constant pool, and descriptor parsing. Nothing
//! here reads or writes class files; see [`crate::file`] for the byte-level primitives the
//! code array codec uses.
//!
//! # Key Components
//!
//! - [`ClassModel`] - A class with its constant pool and methods
//! - [`Method`], [`Code`], [`ExceptionTableEntry`] - Method bodies in raw bytecode form
//! - [`ConstantPool`], [`ConstantPoolEntry`] - The append-only constant pool
//! - [`MethodDescriptor`], [`FieldType`] - Descriptor parsing for slot counting
//!
//! # Examples
//!
//! ```rust
//! use classfold::metadata::{ClassModel, Code, Method, MethodAccessFlags};
//!
//! let mut class = ClassModel::new("demo/Answer");
//! let index = class.constant_pool.add_long(42)?;
//! class.methods.push(
//!     Method::new("answer", "()J", MethodAccessFlags::STATIC)
//!         .with_code(Code::new(2, 0, vec![0x14, 0x00, index as u8, 0xAD])),
//! );
//! # Ok::<(), classfold::Error>(())
//! ```

mod class;
mod constpool;
mod descriptor;
mod method;

pub use class::{ClassAccessFlags, ClassModel, ClassVersion};
pub use constpool::{ConstantPool, ConstantPoolEntry};
pub use descriptor::{FieldType, MethodDescriptor};
pub use method::{Code, ExceptionTableEntry, Method, MethodAccessFlags};
