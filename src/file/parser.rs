//! Low-level byte stream parser for class-file and bytecode decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser designed for reading JVM class-file structures and method bytecode. It offers
//! bounds-checked access to big-endian data, raw byte slices and modified UTF-8 strings.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance`] - Move forward by one byte
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::align`] - Align to byte boundaries
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_be`] - Read primitive types (big-endian)
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a raw slice and advance
//! - [`crate::file::parser::Parser::read_modified_utf8`] - Decode a `CONSTANT_Utf8` payload
//!
//! # Usage Examples
//!
//! ```rust
//! use usagescope::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x41];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 0);
//! assert_eq!(parser.read_be::<u16>()?, 0x41);
//! assert!(!parser.has_more_data());
//! # Ok::<(), usagescope::Error>(())
//! ```

use std::borrow::Cow;

use crate::{
    file::io::{read_be_at, ClassIO},
    Result,
};

/// A generic binary data parser for reading class-file structures.
///
/// `Parser` provides a cursor-based interface for reading big-endian binary data. The parser
/// maintains an internal position cursor and provides bounds checking to prevent buffer
/// overruns when reading malformed or truncated data.
///
/// # Examples
///
/// ```rust
/// use usagescope::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_be::<u32>()?;
/// assert_eq!(first, 0x01020304);
///
/// parser.seek(6)?;
/// let last_bytes = parser.read_be::<u16>()?;
/// assert_eq!(last_bytes, 0x0708);
/// # Ok::<(), usagescope::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
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

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
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
        self.position = self.calc_end_position(step)?;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data
            .get(self.position)
            .copied()
            .ok_or(out_of_bounds_error!())
    }

    /// Align the position to a specific boundary.
    ///
    /// `tableswitch` and `lookupswitch` pad their operands to a 4-byte boundary relative to
    /// the start of the code array, which is why method bodies are parsed with their own
    /// `Parser` over the code slice.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use usagescope::Parser;
    /// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
    /// let mut parser = Parser::new(&data);
    ///
    /// parser.advance()?;
    /// parser.align(4)?;
    /// assert_eq!(parser.pos(), 4);
    /// # Ok::<(), usagescope::Error>(())
    /// ```
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

    /// Calculate the end position for reading `length` bytes from the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the end position would overflow or exceed
    /// the data length.
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

    /// Reads a slice of bytes of the specified length from the current position.
    ///
    /// The returned slice borrows from the original input, not from the parser.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `length` bytes would exceed the data.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self.calc_end_position(length)?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read `length` bytes of modified UTF-8 (JVMS 4.4.7).
    ///
    /// Modified UTF-8 differs from standard UTF-8 in two ways: NUL is encoded as the two-byte
    /// sequence `0xC0 0x80`, and supplementary characters are stored as two encoded UTF-16
    /// surrogates of three bytes each. Input that is already valid standard UTF-8 is borrowed
    /// without copying.
    ///
    /// A surrogate without its partner is legal in a class file (a `"\uD800"` literal compiles
    /// to one) but has no `str` form; it decodes to `U+FFFD`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the string is truncated, or
    /// [`crate::Error::Malformed`] for bytes that can never appear in modified UTF-8.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use usagescope::Parser;
    ///
    /// let data = [b'a', 0xC0, 0x80, b'b'];
    /// let mut parser = Parser::new(&data);
    /// assert_eq!(parser.read_modified_utf8(4)?, "a\0b");
    /// # Ok::<(), usagescope::Error>(())
    /// ```
    pub fn read_modified_utf8(&mut self, length: usize) -> Result<Cow<'a, str>> {
        let bytes = self.read_bytes(length)?;
        if let Ok(text) = std::str::from_utf8(bytes) {
            return Ok(Cow::Borrowed(text));
        }

        let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
        let mut index = 0;
        while index < bytes.len() {
            let lead = bytes[index];
            let (unit, width) = match lead {
                0x01..=0x7F => (u16::from(lead), 1),
                0xC0..=0xDF => {
                    let second = continuation(bytes, index + 1)?;
                    ((u16::from(lead & 0x1F) << 6) | second, 2)
                }
                0xE0..=0xEF => {
                    let second = continuation(bytes, index + 1)?;
                    let third = continuation(bytes, index + 2)?;
                    ((u16::from(lead & 0x0F) << 12) | (second << 6) | third, 3)
                }
                _ => {
                    return Err(malformed_error!(
                        "Invalid modified UTF-8 lead byte {:#04x} at {}",
                        lead,
                        index
                    ))
                }
            };
            units.push(unit);
            index += width;
        }

        Ok(Cow::Owned(String::from_utf16_lossy(&units)))
    }
}

fn continuation(bytes: &[u8], index: usize) -> Result<u16> {
    match bytes.get(index) {
        Some(&byte) if byte & 0xC0 == 0x80 => Ok(u16::from(byte & 0x3F)),
        Some(&byte) => Err(malformed_error!(
            "Invalid modified UTF-8 continuation byte {:#04x} at {}",
            byte,
            index
        )),
        None => Err(out_of_bounds_error!()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn navigation() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.len(), 5);
        assert!(!parser.is_empty());
        parser.advance_by(3).unwrap();
        assert_eq!(parser.pos(), 3);
        assert_eq!(parser.peek_byte().unwrap(), 0x04);
        parser.seek(0).unwrap();
        assert_eq!(parser.read_be::<u8>().unwrap(), 0x01);

        assert!(matches!(parser.seek(5), Err(Error::OutOfBounds { .. })));
        assert!(matches!(parser.advance_by(10), Err(Error::OutOfBounds { .. })));
        assert_eq!(parser.pos(), 1);
    }

    #[test]
    fn align_to_boundary() {
        let data = [0u8; 12];
        let mut parser = Parser::new(&data);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 0);

        parser.advance_by(5).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 8);

        let mut short = Parser::new(&data[..6]);
        short.advance_by(5).unwrap();
        assert!(short.align(4).is_err());
    }

    #[test]
    fn read_bytes_borrows_input() {
        let data = [0x0A, 0x0B, 0x0C];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_bytes(2).unwrap(), &[0x0A, 0x0B]);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.read_bytes(1).unwrap(), &[0x0C]);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn modified_utf8_plain_is_borrowed() {
        let data = b"net/minecraft/Foo";
        let mut parser = Parser::new(data);
        let text = parser.read_modified_utf8(data.len()).unwrap();
        assert!(matches!(text, Cow::Borrowed("net/minecraft/Foo")));
    }

    #[test]
    fn modified_utf8_supplementary_character() {
        // U+1F600 as a surrogate pair: D83D DE00
        let data = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        let mut parser = Parser::new(&data);
        let text = parser.read_modified_utf8(data.len()).unwrap();
        assert_eq!(text, "\u{1F600}");
    }

    #[test]
    fn modified_utf8_errors() {
        let mut parser = Parser::new(&[0xFF]);
        assert!(matches!(
            parser.read_modified_utf8(1),
            Err(Error::Malformed { .. })
        ));

        let mut parser = Parser::new(&[0xC0]);
        assert!(matches!(
            parser.read_modified_utf8(1),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn modified_utf8_unpaired_surrogates() {
        // "\uD800" on its own
        let mut parser = Parser::new(&[0xED, 0xA0, 0x80]);
        assert_eq!(parser.read_modified_utf8(3).unwrap(), "\u{FFFD}");

        // Low surrogate first, then a valid pair
        let data = [0xED, 0xB8, 0x80, b'x', 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        let mut parser = Parser::new(&data);
        assert_eq!(
            parser.read_modified_utf8(data.len()).unwrap(),
            "\u{FFFD}x\u{1F600}"
        );
        assert!(!parser.has_more_data());
    }
}
