//! Low-level binary read/write primitives for cabinet parsing.
//!
//! All cabinet fields are little-endian. Reads go through [`ByteReader`], a
//! bounds-checked cursor over the input buffer that fails with
//! [`FormatError::Truncated`] instead of panicking; writes append to a
//!`Vec<u8>` through the `put_*` helpers.

use crate::error::FormatError;

/// A bounds-checked cursor over a byte buffer.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of the buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the read position to an absolute offset.
    pub fn seek(&mut self, pos: usize, reason: &'static str) -> Result<(), FormatError> {
        if pos > self.buf.len() {
            return Err(FormatError::Truncated {
                offset: pos,
                reason,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Takes `count` bytes, advancing the cursor.
    pub fn read_bytes(&mut self, count: usize, reason: &'static str) -> Result<&'a [u8], FormatError> {
        let end = self.pos.checked_add(count).ok_or(FormatError::Truncated {
            offset: self.pos,
            reason,
        })?;
        if end > self.buf.len() {
            return Err(FormatError::Truncated {
                offset: self.pos,
                reason,
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self, reason: &'static str) -> Result<u8, FormatError> {
        Ok(self.read_bytes(1, reason)?[0])
    }

    /// Reads an unsigned 16-bit little-endian integer.
    pub fn read_u16_le(&mut self, reason: &'static str) -> Result<u16, FormatError> {
        let b = self.read_bytes(2, reason)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Reads an unsigned 32-bit little-endian integer.
    pub fn read_u32_le(&mut self, reason: &'static str) -> Result<u32, FormatError> {
        let b = self.read_bytes(4, reason)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads bytes up to (and consuming) a NUL terminator.
    ///
    /// The terminator is not included in the returned slice.
    pub fn read_null_terminated(&mut self, reason: &'static str) -> Result<&'a [u8], FormatError> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(nul) => {
                let slice = &rest[..nul];
                self.pos += nul + 1;
                Ok(slice)
            }
            None => Err(FormatError::Truncated {
                offset: self.pos,
                reason,
            }),
        }
    }
}

/// Appends an unsigned 16-bit little-endian integer.
pub fn put_u16_le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends an unsigned 32-bit little-endian integer.
pub fn put_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a string as raw bytes followed by a NUL terminator.
pub fn put_null_terminated(out: &mut Vec<u8>, name: &[u8]) {
    out.extend_from_slice(name);
    out.push(0);
}
