//! Low-level big-endian reading and writing utilities for class file code arrays.
//!
//! The class file format stores every multi-byte quantity in big-endian order. This module
//! provides the [`crate::file::io::ClassIO`] trait and a pair of bounds-checked helpers built
//! on top of it:
//!
//! - [`crate::file::io::read_be_at`] - Read a value at an offset and advance the offset
//! - [`crate::file::io::write_be`] - Append a value to a growable byte buffer
//!
//! # Examples
//!
//! ```rust,ignore
//! use classfold::file::io::{read_be_at, write_be};
//!
//! let data = [0x00, 0x2A, 0xFF, 0xFE];
//! let mut offset = 0;
//! let first: u16 = read_be_at(&data, &mut offset)?;
//! let second: i16 = read_be_at(&data, &mut offset)?;
//! assert_eq!((first, second), (42, -2));
//!
//! let mut out = Vec::new();
//! write_be(&mut out, 42u16);
//! assert_eq!(out, [0x00, 0x2A]);
//! # Ok::<(), classfold::Error>(())
//! ```
//!
//! # Error Handling
//!
//! Reading returns [`crate::Error::OutOfBounds`] when the buffer holds fewer bytes than the
//! requested type needs. Writing into a `Vec<u8>` cannot fail.

use crate::{Error::OutOfBounds, Result};

/// Trait for type-specific big-endian conversion of primitive values.
///
/// Each implementation names the fixed-size byte array used by that type (for example
/// `[u8; 4]` for `i32`) and forwards to the standard library conversions.
pub trait ClassIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:literal),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
    f32 => 4,
    f64 => 8,
);

/// Reads a big-endian value of type `T` at `offset` and advances `offset` past it.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced on success)
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if `data` holds fewer than `size_of::<T>()` bytes
/// after `offset`.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Appends the big-endian encoding of `value` to `data`.
pub fn write_be<T: ClassIO>(data: &mut Vec<u8>, value: T) {
    data.extend_from_slice(value.to_be_bytes().as_ref());
}
