//! Field and method descriptors.
//!
//! Descriptors are only parsed as far as the optimizer needs them: to count the stack and
//! local variable slots of parameters and return values. `long` and `double` count as two
//! slots, everything else (including references and arrays) as one.
//!
//! # Examples
//!
//! ```rust
//! use classfold::metadata::MethodDescriptor;
//!
//! let descriptor = MethodDescriptor::parse("(IJ[Ljava/lang/String;D)V")?;
//! assert_eq!(descriptor.parameters.len(), 4);
//! assert_eq!(descriptor.parameter_slots(), 1 + 2 + 1 + 2);
//! assert_eq!(descriptor.return_slots(), 0);
//! # Ok::<(), classfold::Error>(())
//! ```

use crate::{assembly::TypeTag, file::Parser, Result};

/// A field type as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `D`
    Double,
    /// `F`
    Float,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `S`
    Short,
    /// `Z`
    Boolean,
    /// `L<binary name>;`
    Object(String),
    /// `[<component>`
    Array(Box<FieldType>),
}

impl FieldType {
    /// Parses a complete field descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not exactly one field type.
    pub fn parse(descriptor: &str) -> Result<FieldType> {
        let mut parser = Parser::new(descriptor.as_bytes());
        let field = parse_field(&mut parser, descriptor)?;
        if parser.has_more_data() {
            return Err(malformed_error!(
                "Trailing characters in field descriptor '{}'",
                descriptor
            ));
        }
        Ok(field)
    }

    /// Number of slots a value of this type occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        self.stack_type().slots()
    }

    /// Type of a value of this field type on the operand stack.
    #[must_use]
    pub fn stack_type(&self) -> TypeTag {
        match self {
            FieldType::Byte | FieldType::Char | FieldType::Short | FieldType::Boolean => {
                TypeTag::Int
            }
            FieldType::Int => TypeTag::Int,
            FieldType::Long => TypeTag::Long,
            FieldType::Float => TypeTag::Float,
            FieldType::Double => TypeTag::Double,
            FieldType::Object(_) | FieldType::Array(_) => TypeTag::Reference,
        }
    }
}

/// A parsed method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Parameter types in declaration order
    pub parameters: Vec<FieldType>,
    /// Return type, `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Parses a method descriptor such as `(ILjava/lang/String;)J`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `descriptor` is not a valid method descriptor.
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
        let mut parser = Parser::new(descriptor.as_bytes());
        if parser.read_be::<u8>()? != b'(' {
            return Err(malformed_error!(
                "Method descriptor '{}' does not start with '('",
                descriptor
            ));
        }

        let mut parameters = Vec::new();
        while parser.peek_byte()? != b')' {
            parameters.push(parse_field(&mut parser, descriptor)?);
        }
        parser.advance()?;

        let return_type = if parser.peek_byte()? == b'V' {
            parser.advance()?;
            None
        } else {
            Some(parse_field(&mut parser, descriptor)?)
        };

        if parser.has_more_data() {
            return Err(malformed_error!(
                "Trailing characters in method descriptor '{}'",
                descriptor
            ));
        }

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Total slots taken by the parameters, excluding `this`.
    #[must_use]
    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(FieldType::slots).sum()
    }

    /// Slots pushed by the return value.
    #[must_use]
    pub fn return_slots(&self) -> u16 {
        self.return_type.as_ref().map_or(0, FieldType::slots)
    }
}

fn parse_field(parser: &mut Parser, descriptor: &str) -> Result<FieldType> {
    let field = match parser.read_be::<u8>()? {
        b'B' => FieldType::Byte,
        b'C' => FieldType::Char,
        b'D' => FieldType::Double,
        b'F' => FieldType::Float,
        b'I' => FieldType::Int,
        b'J' => FieldType::Long,
        b'S' => FieldType::Short,
        b'Z' => FieldType::Boolean,
        b'[' => FieldType::Array(Box::new(parse_field(parser, descriptor)?)),
        b'L' => {
            let start = parser.pos();
            while parser.read_be::<u8>()? != b';' {}
            let name = &parser.data()[start..parser.pos() - 1];
            if name.is_empty() {
                return Err(malformed_error!(
                    "Empty class name in descriptor '{}'",
                    descriptor
                ));
            }
            FieldType::Object(String::from_utf8_lossy(name).into_owned())
        }
        other => {
            return Err(malformed_error!(
                "Invalid type character '{}' in descriptor '{}'",
                char::from(other),
                descriptor
            ))
        }
    };

    Ok(field)
}
