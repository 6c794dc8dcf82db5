//! Byte cursor for decoding method code arrays.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor over a byte slice
//! used by the bytecode decoder. Every read is bounds-checked and all multi-byte values are
//! big-endian, as required by the class file format.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::advance`] - Move forward by one byte
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Skip switch padding up to a byte boundary
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_be`] - Read primitive types (big-endian)
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a raw chunk of the buffer
//!
//! # Usage Examples
//!
//! ```rust
//! use classfold::Parser;
//!
//! // sipush 1000
//! let data = [0x11, 0x03, 0xE8];
//! let mut parser = Parser::new(&data);
//!
//! let opcode = parser.read_be::<u8>()?;
//! let value = parser.read_be::<i16>()?;
//! assert_eq!((opcode, value), (0x11, 1000));
//! assert!(!parser.has_more_data());
//! # Ok::<(), classfold::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Error::OutOfBounds,
    Result,
};

/// A cursor-based reader over a method's code array.
///
/// `Parser` keeps a position within a borrowed byte slice and advances it with every read.
/// The decoder relies on [`Parser::pos`] to map instructions back to their bytecode offsets,
/// which is how branch displacements are turned into instruction handles.
///
/// # Examples
///
/// ```rust
/// use classfold::Parser;
///
/// // goto -3
/// let data = [0xA7, 0xFF, 0xFD];
/// let mut parser = Parser::new(&data);
///
/// assert_eq!(parser.peek_byte()?, 0xA7);
/// parser.advance()?;
/// assert_eq!(parser.read_be::<i16>()?, -3);
/// # Ok::<(), classfold::Error>(())
/// ```
pub struct Parser<'a> {
    /// The bytecode being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the position forward by one byte.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing would exceed the data length.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Arguments
    /// * `step` - Amount of bytes to advance
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self.calc_end_position(step)?;
        self.position = end;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Align the position to a specific boundary.
    ///
    /// `tableswitch` and `lookupswitch` pad their operands so that the first one starts at a
    /// multiple of four from the beginning of the code array.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Returns the number of bytes remaining from the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// End position after `length` more bytes, checked against the buffer.
    fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self.position.checked_add(length).ok_or(OutOfBounds)?;

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(end)
    }

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_read_be_operands() {
        // bipush -1, sipush 300, ldc_w 258
        let data = [0x10, 0xFF, 0x11, 0x01, 0x2C, 0x13, 0x01, 0x02];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_be::<u8>().unwrap(), 0x10);
        assert_eq!(parser.read_be::<i8>().unwrap(), -1);
        assert_eq!(parser.read_be::<u8>().unwrap(), 0x11);
        assert_eq!(parser.read_be::<i16>().unwrap(), 300);
        assert_eq!(parser.read_be::<u8>().unwrap(), 0x13);
        assert_eq!(parser.read_be::<u16>().unwrap(), 258);
        assert!(!parser.has_more_data());
        assert_eq!(parser.remaining(), 0);
    }

    #[test]
    fn test_error_handling() {
        let mut parser = Parser::new(&[0x11, 0x01]);
        assert!(parser.advance().is_ok());
        assert!(matches!(parser.read_be::<i16>(), Err(Error::OutOfBounds)));
        assert_eq!(parser.pos(), 1);

        assert!(matches!(parser.advance_by(2), Err(Error::OutOfBounds)));
        assert!(matches!(
            Parser::new(&[]).peek_byte(),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn test_align_switch_padding() {
        // tableswitch at offset 1 pads two bytes before its default offset
        let data = [0x00, 0xAA, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10];
        let mut parser = Parser::new(&data);
        parser.advance_by(2).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.read_be::<i32>().unwrap(), 16);

        // already aligned, no padding
        let mut parser = Parser::new(&data);
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 0);

        let mut parser = Parser::new(&data[..3]);
        parser.advance_by(2).unwrap();
        assert!(parser.align(4).is_err());
    }

    #[test]
    fn test_read_bytes() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_bytes(3).unwrap(), &[0x01, 0x02, 0x03]);
        assert_eq!(parser.pos(), 3);
        assert!(parser.read_bytes(3).is_err());
        assert_eq!(parser.pos(), 3);
    }
}
