//! Cursor-based, bounds-checked binary parser.
//!
//! [`crate::file::parser::Parser`] wraps a byte slice and a position. Every read checks the
//! remaining length first, so a malformed or truncated input surfaces as
//! [`crate::Error::OutOfBounds`] rather than a panic or a read past the end of the buffer.
//! It is used by the class-file codec, the generic signature parser and the sfnt name-table
//! parser alike.
//!
//! # Examples
//!
//! ```rust
//! use classweave::Parser;
//!
//! let data = [0x00, 0x02, 0x41, 0x42];
//! let mut parser = Parser::new(&data);
//! let len = parser.read_be::<u16>()?;
//! let bytes = parser.read_bytes(len as usize)?;
//! assert_eq!(bytes, b"AB");
//! assert!(!parser.has_more_data());
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, BinIO},
    Result,
};

/// A bounds-checked cursor over a borrowed byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether there is data left after the current position.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is not inside the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Skip `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the step crosses the end of the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let end = self.calc_end_position(step)?;
        self.position = end;
        Ok(())
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The complete underlying data.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Return the byte at the cursor without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Run `f`, restoring the cursor if it fails.
    ///
    /// # Errors
    /// Propagates the error returned by `f`.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Advance the cursor to the next multiple of `alignment`, relative to the start of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the padding crosses the end of the data.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a big-endian value and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_be<T: BinIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Number of bytes after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check that at least `needed` bytes are left.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] otherwise.
    pub fn ensure_remaining(&self, needed: usize) -> Result<()> {
        if self.remaining() < needed {
            return Err(out_of_bounds_error!());
        }
        Ok(())
    }

    /// Compute the position `length` bytes after the cursor, checking for overflow and bounds.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the end lies outside the data.
    pub fn calc_end_position(&self, length: usize) -> Result<usize> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(end)
    }

    /// Borrow the next `length` bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes are left.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read bytes up to (not including) the first byte contained in `stops`, as UTF-8.
    ///
    /// The stop byte itself is not consumed. Reaching the end of the data is an error, since
    /// every identifier in the formats handled here is terminated.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no stop byte follows, or
    /// [`crate::Error::Malformed`] if the identifier is empty or not UTF-8.
    pub fn read_identifier(&mut self, stops: &[u8]) -> Result<&'a str> {
        let start = self.position;
        let Some(len) = self.data[start..]
            .iter()
            .position(|byte| stops.contains(byte))
        else {
            return Err(out_of_bounds_error!());
        };

        if len == 0 {
            return Err(malformed_error!("Empty identifier at offset {}", start));
        }

        let bytes = &self.data[start..start + len];
        self.position = start + len;

        std::str::from_utf8(bytes)
            .map_err(|e| malformed_error!("Invalid UTF-8 identifier at offset {}: {}", start, e))
    }
}
