//! Byte order aware, bounds-checked reading and writing of primitive values.
//!
//! Both binary formats handled by this crate (JVM class files and sfnt font containers) store
//! every multi-byte integer in big-endian order, so this module only offers big-endian
//! accessors. All reads are bounds-checked and return [`crate::Error::OutOfBounds`] instead of
//! panicking.
//!
//! # Key Components
//!
//! - [`crate::file::io::BinIO`] - Trait describing the byte conversions of a primitive type
//! - [`crate::file::io::read_be_at`] - Bounds-checked reads advancing an offset
//! - [`crate::file::io::write_be_at`] - Bounds-checked in-place writes (used for fixups)
//! - [`crate::file::io::put_be`] - Appending writes into a growable buffer
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classweave::file::io::{read_be_at, put_be};
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE];
//! let mut offset = 0;
//! let magic: u32 = read_be_at(&data, &mut offset)?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! let mut out = Vec::new();
//! put_be(&mut out, 0x0102_u16);
//! assert_eq!(out, [0x01, 0x02]);
//! ```

use crate::Result;

/// Trait for primitive types that can be converted from and to big-endian byte arrays.
///
/// Implemented for `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `u64`, `i64`, `f32` and `f64`.
pub trait BinIO: Sized {
    /// Fixed-size byte array backing this type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Build the value from its big-endian representation
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Convert the value into its big-endian representation
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_bin_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl BinIO for $ty {
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

impl_bin_io!(
    u8 => 1, i8 => 1,
    u16 => 2, i16 => 2,
    u32 => 4, i32 => 4,
    u64 => 8, i64 => 8,
    f32 => 4, f64 => 8,
);

/// Reads a big-endian value at `offset` and advances the offset past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of `data`.
pub fn read_be_at<T: BinIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or(out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Writes a big-endian value at `offset` into an existing buffer and advances the offset.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would cross the end of `data`.
pub fn write_be_at<T: BinIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let end = offset
        .checked_add(type_len)
        .ok_or(out_of_bounds_error!())?;
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(value.to_be_bytes().as_ref());
    *offset = end;

    Ok(())
}

/// Appends a big-endian value to a growable buffer.
pub fn put_be<T: BinIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_be_bytes().as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_be_widths() {
        let mut offset = 0;
        assert_eq!(read_be_at::<i32>(&TEST_BUFFER, &mut offset).unwrap(), 0x0102_0304);
        let mut offset = 0;
        assert_eq!(
            read_be_at::<u64>(&TEST_BUFFER, &mut offset).unwrap(),
            0x0102_0304_0506_0708
        );
        assert_eq!(offset, 8);
    }

    #[test]
    fn read_be_at_advances() {
        let mut offset = 2;
        let result = read_be_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0304);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_be_out_of_bounds() {
        let mut offset = 7;
        let result = read_be_at::<u16>(&TEST_BUFFER, &mut offset);
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
        assert_eq!(offset, 7);

        let mut offset = usize::MAX;
        assert!(read_be_at::<u8>(&TEST_BUFFER, &mut offset).is_err());
    }

    #[test]
    fn write_be_at_in_place() {
        let mut buffer = [0u8; 4];
        let mut offset = 1;
        write_be_at(&mut buffer, &mut offset, 0xABCD_u16).unwrap();
        assert_eq!(buffer, [0x00, 0xAB, 0xCD, 0x00]);
        assert_eq!(offset, 3);

        let mut offset = 3;
        assert!(write_be_at(&mut buffer, &mut offset, 0xABCD_u16).is_err());
    }

    #[test]
    fn put_be_appends() {
        let mut out = vec![0xFF];
        put_be(&mut out, -2_i16);
        put_be(&mut out, 1.0_f32);
        assert_eq!(out, [0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]);
    }
}
