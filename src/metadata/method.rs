//! Methods and their `Code` attribute.

use bitflags::bitflags;

use crate::{metadata::MethodDescriptor, Result};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property flags
    pub struct MethodAccessFlags: u16 {
        /// Declared `public`
        const PUBLIC = 0x0001;
        /// Declared `private`
        const PRIVATE = 0x0002;
        /// Declared `protected`
        const PROTECTED = 0x0004;
        /// Declared `static`
        const STATIC = 0x0008;
        /// Declared `final`
        const FINAL = 0x0010;
        /// Declared `synchronized`
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Declared `native`
        const NATIVE = 0x0100;
        /// Declared `abstract`
        const ABSTRACT = 0x0400;
        /// Declared `strictfp`
        const STRICT = 0x0800;
        /// Not present in the source code
        const SYNTHETIC = 0x1000;
    }
}

/// One entry of a method's exception table, in bytecode offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionTableEntry {
    /// First protected offset (inclusive)
    pub start_pc: u16,
    /// End of the protected range (exclusive)
    pub end_pc: u16,
    /// Offset of the handler
    pub handler_pc: u16,
    /// Constant pool index of the caught class, 0 for any
    pub catch_type: u16,
}

/// The `Code` attribute of a method.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Code {
    /// Maximum operand stack depth, in slots
    pub max_stack: u16,
    /// Number of local variable slots, including parameters
    pub max_locals: u16,
    /// The raw code array
    pub code: Vec<u8>,
    /// Exception handlers in priority order
    pub exception_table: Vec<ExceptionTableEntry>,
}

impl Code {
    /// Creates a code attribute without exception handlers.
    #[must_use]
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Code {
            max_stack,
            max_locals,
            code,
            exception_table: Vec::new(),
        }
    }

    /// Adds an exception handler.
    #[must_use]
    pub fn with_handler(mut self, entry: ExceptionTableEntry) -> Self {
        self.exception_table.push(entry);
        self
    }
}

/// A method of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// Simple name (`<init>` for constructors)
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access_flags: MethodAccessFlags,
    /// Body, `None` for `abstract` and `native` methods
    pub code: Option<Code>,
}

impl Method {
    /// Creates a method without a body.
    #[must_use]
    pub fn new(name: &str, descriptor: &str, access_flags: MethodAccessFlags) -> Self {
        Method {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access_flags,
            code: None,
        }
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }

    /// Returns `true` for `static` methods, which have no `this` in slot 0.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// `name` followed by `descriptor`, as used in diagnostics.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor)
    }

    /// Parses the descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn parsed_descriptor(&self) -> Result<MethodDescriptor> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// Local variable slots taken by the arguments, including `this`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn argument_slots(&self) -> Result<u16> {
        let this = u16::from(!self.is_static());
        Ok(self.parsed_descriptor()?.parameter_slots() + this)
    }
}
