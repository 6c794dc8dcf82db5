//! The class constant pool.
//!
//! Index `0` is never used, and `long`/`double` entries occupy two indices, the second of
//! which is unusable. [`ConstantPool`] models both rules so that indices handed out by
//! [`ConstantPool::push`] are exactly the ones a class file writer would produce.
//!
//! During optimization the pool is append-only: numeric results are interned through
//! [`ConstantPool::add_numeric`] and the `add_*` helpers, which return an existing identical
//! entry when there is one. Floating point entries are compared by bit pattern.
//!
//! # Examples
//!
//! ```rust
//! use classfold::metadata::{ConstantPool, ConstantPoolEntry};
//! use classfold::assembly::NumericValue;
//!
//! let mut pool = ConstantPool::new();
//! let five = pool.add_integer(5)?;
//! let pi = pool.add_double(3.25)?;
//!
//! assert_eq!(five, 1);
//! assert_eq!(pi, 2);
//! assert_eq!(pool.count(), 4); // the double takes two slots
//! assert_eq!(pool.add_integer(5)?, five);
//! assert_eq!(pool.numeric(pi)?, NumericValue::F64(3.25));
//! # Ok::<(), classfold::Error>(())
//! ```

use strum::Display;

use crate::{assembly::NumericValue, Error, Result};

/// One entry of the constant pool.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ConstantPoolEntry {
    /// Modified UTF-8 string, held decoded
    Utf8(String),
    /// `int` literal
    Integer(i32),
    /// `float` literal
    Float(f32),
    /// `long` literal (two slots)
    Long(i64),
    /// `double` literal (two slots)
    Double(f64),
    /// Class or interface reference
    Class {
        /// Index of the `Utf8` binary name
        name_index: u16,
    },
    /// `java.lang.String` literal
    String {
        /// Index of the `Utf8` contents
        string_index: u16,
    },
    /// Field reference
    FieldRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Class method reference
    MethodRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Interface method reference
    InterfaceMethodRef {
        /// Index of the owning `Class`
        class_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Name and descriptor pair
    NameAndType {
        /// Index of the `Utf8` name
        name_index: u16,
        /// Index of the `Utf8` descriptor
        descriptor_index: u16,
    },
    /// Method handle
    MethodHandle {
        /// Kind of the handle (1..=9)
        reference_kind: u8,
        /// Index of the referenced member
        reference_index: u16,
    },
    /// Method type
    MethodType {
        /// Index of the `Utf8` method descriptor
        descriptor_index: u16,
    },
    /// Dynamically computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Call site of an `invokedynamic`
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method_attr_index: u16,
        /// Index of the `NameAndType`
        name_and_type_index: u16,
    },
    /// Module name
    Module {
        /// Index of the `Utf8` name
        name_index: u16,
    },
    /// Package name
    Package {
        /// Index of the `Utf8` name
        name_index: u16,
    },
}

impl ConstantPoolEntry {
    /// Number of pool indices the entry occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_) => 2,
            _ => 1,
        }
    }

    /// The literal held by a numeric entry.
    #[must_use]
    pub fn numeric_value(&self) -> Option<NumericValue> {
        match self {
            ConstantPoolEntry::Integer(value) => Some(NumericValue::I32(*value)),
            ConstantPoolEntry::Long(value) => Some(NumericValue::I64(*value)),
            ConstantPoolEntry::Float(value) => Some(NumericValue::F32(*value)),
            ConstantPoolEntry::Double(value) => Some(NumericValue::F64(*value)),
            _ => None,
        }
    }

    fn name_and_type_index(&self) -> Option<u16> {
        match self {
            ConstantPoolEntry::FieldRef {
                name_and_type_index,
                ..
            }
            | ConstantPoolEntry::MethodRef {
                name_and_type_index,
                ..
            }
            | ConstantPoolEntry::InterfaceMethodRef {
                name_and_type_index,
                ..
            }
            | ConstantPoolEntry::Dynamic {
                name_and_type_index,
                ..
            }
            | ConstantPoolEntry::InvokeDynamic {
                name_and_type_index,
                ..
            } => Some(*name_and_type_index),
            _ => None,
        }
    }
}

impl From<NumericValue> for ConstantPoolEntry {
    fn from(value: NumericValue) -> Self {
        match value {
            NumericValue::I32(value) => ConstantPoolEntry::Integer(value),
            NumericValue::I64(value) => ConstantPoolEntry::Long(value),
            NumericValue::F32(value) => ConstantPoolEntry::Float(value),
            NumericValue::F64(value) => ConstantPoolEntry::Double(value),
        }
    }
}

/// The constant pool of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Option<ConstantPoolEntry>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        ConstantPool::new()
    }
}

impl ConstantPool {
    /// Creates a pool holding only the reserved index `0`.
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
        }
    }

    /// The `constant_pool_count` of the class file: one more than the highest index.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// The entry at `index`, `None` for `0`, the second slot of a wide entry, or an index
    /// past the end.
    #[must_use]
    pub fn get(&self, index: u16) -> Option<&ConstantPoolEntry> {
        self.entries.get(usize::from(index)).and_then(Option::as_ref)
    }

    /// Iterates over `(index, entry)` pairs of all usable indices.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantPoolEntry)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            let index = u16::try_from(index).ok()?;
            entry.as_ref().map(|entry| (index, entry))
        })
    }

    /// Appends an entry without interning and returns its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] when the entry would not fit below the
    /// 65535 index limit.
    pub fn push(&mut self, entry: ConstantPoolEntry) -> Result<u16> {
        let slots = usize::from(entry.slots());
        let index = self.entries.len();
        if index + slots > usize::from(u16::MAX) {
            return Err(Error::ConstantPoolOverflow);
        }

        let wide = slots == 2;
        self.entries.push(Some(entry));
        if wide {
            self.entries.push(None);
        }

        u16::try_from(index).map_err(|_| Error::ConstantPoolOverflow)
    }

    /// Returns the index of an entry equal to `entry`, appending it if there is none.
    ///
    /// Numeric entries are matched by bit pattern.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn intern(&mut self, entry: ConstantPoolEntry) -> Result<u16> {
        let existing = match entry.numeric_value() {
            Some(value) => self.find_numeric(value),
            None => self
                .iter()
                .find(|(_, candidate)| **candidate == entry)
                .map(|(index, _)| index),
        };

        match existing {
            Some(index) => Ok(index),
            None => self.push(entry),
        }
    }

    /// Interns a numeric literal of the entry kind matching its width.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_numeric(&mut self, value: NumericValue) -> Result<u16> {
        self.intern(ConstantPoolEntry::from(value))
    }

    /// Interns an `int` literal.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_integer(&mut self, value: i32) -> Result<u16> {
        self.add_numeric(NumericValue::I32(value))
    }

    /// Interns a `long` literal.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_long(&mut self, value: i64) -> Result<u16> {
        self.add_numeric(NumericValue::I64(value))
    }

    /// Interns a `float` literal.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_float(&mut self, value: f32) -> Result<u16> {
        self.add_numeric(NumericValue::F32(value))
    }

    /// Interns a `double` literal.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_double(&mut self, value: f64) -> Result<u16> {
        self.add_numeric(NumericValue::F64(value))
    }

    /// Interns a `Utf8` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(ConstantPoolEntry::Utf8(value.to_string()))
    }

    /// Interns a `Class` entry together with its name.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        self.intern(ConstantPoolEntry::Class { name_index })
    }

    /// Interns a `String` entry together with its contents.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let string_index = self.add_utf8(value)?;
        self.intern(ConstantPoolEntry::String { string_index })
    }

    /// Interns a `NameAndType` entry.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(ConstantPoolEntry::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Interns a `Methodref` to `class.name descriptor`.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::MethodRef {
            class_index,
            name_and_type_index,
        })
    }

    /// Interns a `Fieldref` to `class.name descriptor`.
    ///
    /// # Errors
    /// See [`ConstantPool::push`].
    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(ConstantPoolEntry::FieldRef {
            class_index,
            name_and_type_index,
        })
    }

    /// The literal held by the numeric entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NonNumericConstant`] if the entry is not a number, and
    /// [`crate::Error::Malformed`] if `index` is not a usable index at all.
    pub fn numeric(&self, index: u16) -> Result<NumericValue> {
        self.entry(index)?
            .numeric_value()
            .ok_or(Error::NonNumericConstant { index })
    }

    /// The string held by the `Utf8` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or not `Utf8`.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            ConstantPoolEntry::Utf8(value) => Ok(value),
            other => Err(malformed_error!(
                "Constant pool entry {} is {}, expected Utf8",
                index,
                other
            )),
        }
    }

    /// The binary name of the `Class` entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the entry is missing or not a `Class`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            ConstantPoolEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(malformed_error!(
                "Constant pool entry {} is {}, expected Class",
                index,
                other
            )),
        }
    }

    /// The `(name, descriptor)` pair of a member reference or dynamic call site.
    ///
    /// Accepts `Fieldref`, `Methodref`, `InterfaceMethodref`, `Dynamic` and `InvokeDynamic`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if any entry on the way has the wrong kind.
    pub fn member(&self, index: u16) -> Result<(&str, &str)> {
        let entry = self.entry(index)?;
        let nat_index = entry.name_and_type_index().ok_or_else(|| {
            malformed_error!(
                "Constant pool entry {} is {}, expected a member reference",
                index,
                entry
            )
        })?;

        match self.entry(nat_index)? {
            ConstantPoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(malformed_error!(
                "Constant pool entry {} is {}, expected NameAndType",
                nat_index,
                other
            )),
        }
    }

    /// The descriptor of a member reference or dynamic call site.
    ///
    /// # Errors
    /// See [`ConstantPool::member`].
    pub fn member_descriptor(&self, index: u16) -> Result<&str> {
        self.member(index).map(|(_, descriptor)| descriptor)
    }

    fn entry(&self, index: u16) -> Result<&ConstantPoolEntry> {
        self.get(index).ok_or_else(|| {
            malformed_error!(
                "Constant pool index {} is not usable (count {})",
                index,
                self.entries.len()
            )
        })
    }

    fn find_numeric(&self, value: NumericValue) -> Option<u16> {
        self.iter()
            .find(|(_, entry)| entry.numeric_value() == Some(value))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        let long = pool.add_long(7).unwrap();
        let int = pool.add_integer(7).unwrap();

        assert_eq!(long, 1);
        assert_eq!(int, 3);
        assert!(pool.get(2).is_none());
        assert!(pool.get(0).is_none());
        assert_eq!(pool.count(), 4);
    }

    #[test]
    fn test_interning_by_bits() {
        let mut pool = ConstantPool::new();
        let zero = pool.add_float(0.0).unwrap();
        let negative_zero = pool.add_float(-0.0).unwrap();
        let nan = pool.add_double(f64::NAN).unwrap();

        assert_ne!(zero, negative_zero);
        assert_eq!(pool.add_double(f64::NAN).unwrap(), nan);
        assert_eq!(pool.add_float(0.0).unwrap(), zero);

        // same numeric value, different kind
        let int_one = pool.add_integer(1).unwrap();
        let long_one = pool.add_long(1).unwrap();
        assert_ne!(int_one, long_one);
    }

    #[test]
    fn test_numeric_lookup() {
        let mut pool = ConstantPool::new();
        let text = pool.add_string("hello").unwrap();
        let value = pool.add_integer(-3).unwrap();

        assert_eq!(pool.numeric(value), Ok(NumericValue::I32(-3)));
        assert_eq!(
            pool.numeric(text),
            Err(Error::NonNumericConstant { index: text })
        );
        assert!(matches!(pool.numeric(200), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_member_lookup() {
        let mut pool = ConstantPool::new();
        let method = pool
            .add_method_ref("java/lang/Integer", "intValue", "()I")
            .unwrap();
        let field = pool
            .add_field_ref("java/lang/System", "out", "Ljava/io/PrintStream;")
            .unwrap();

        assert_eq!(pool.member(method).unwrap(), ("intValue", "()I"));
        assert_eq!(
            pool.member_descriptor(field).unwrap(),
            "Ljava/io/PrintStream;"
        );
        let int_index = pool.add_integer(1).unwrap();
        assert!(pool.member(int_index).is_err());

        // interning reuses the whole chain
        let again = pool
            .add_method_ref("java/lang/Integer", "intValue", "()I")
            .unwrap();
        assert_eq!(again, method);
    }

    #[test]
    fn test_overflow() {
        let mut pool = ConstantPool::new();
        for value in 0..65533 {
            pool.push(ConstantPoolEntry::Integer(value)).unwrap();
        }
        assert_eq!(pool.count(), 65534);

        assert_eq!(
            pool.push(ConstantPoolEntry::Long(1)),
            Err(Error::ConstantPoolOverflow)
        );
        assert_eq!(pool.push(ConstantPoolEntry::Integer(1)), Ok(65534));
        assert_eq!(
            pool.push(ConstantPoolEntry::Integer(2)),
            Err(Error::ConstantPoolOverflow)
        );
    }
}
