//! The in-memory class model handed to and returned from the optimizer.

use bitflags::bitflags;

use crate::metadata::{ConstantPool, Method};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property flags
    pub struct ClassAccessFlags: u16 {
        /// Declared `public`
        const PUBLIC = 0x0001;
        /// Declared `final`
        const FINAL = 0x0010;
        /// Treat superclass methods specially in `invokespecial`
        const SUPER = 0x0020;
        /// Is an interface
        const INTERFACE = 0x0200;
        /// Declared `abstract`
        const ABSTRACT = 0x0400;
        /// Not present in the source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an `enum` class
        const ENUM = 0x4000;
        /// Is a module, not a class
        const MODULE = 0x8000;
    }
}

/// Class file format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassVersion {
    /// Major version (52 for Java 8)
    pub major: u16,
    /// Minor version
    pub minor: u16,
}

impl Default for ClassVersion {
    fn default() -> Self {
        ClassVersion {
            major: 52,
            minor: 0,
        }
    }
}

/// A class: its name, constant pool and methods.
///
/// Fields, attributes and the rest of the class file are of no concern to the optimizer and
/// are left to whoever builds and serializes the model.
///
/// # Examples
///
/// ```rust
/// use classfold::metadata::{ClassModel, Code, Method, MethodAccessFlags};
///
/// let mut class = ClassModel::new("demo/Constants");
/// class.methods.push(
///     Method::new("answer", "()I", MethodAccessFlags::STATIC)
///         .with_code(Code::new(1, 0, vec![0x10, 42, 0xAC])),
/// );
/// assert_eq!(class.find_method("answer").map(|m| m.descriptor.as_str()), Some("()I"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClassModel {
    /// Binary name, e.g. `java/lang/Object`
    pub name: String,
    /// Format version
    pub version: ClassVersion,
    /// Access flags
    pub access_flags: ClassAccessFlags,
    /// The shared constant pool
    pub constant_pool: ConstantPool,
    /// Methods in declaration order
    pub methods: Vec<Method>,
}

impl ClassModel {
    /// Creates a public class with an empty pool and no methods.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassModel {
            name: name.to_string(),
            version: ClassVersion::default(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            constant_pool: ConstantPool::new(),
            methods: Vec::new(),
        }
    }

    /// The first method named `name`.
    #[must_use]
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|method| method.name == name)
    }
}
