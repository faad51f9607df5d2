//! Explicit little-endian encoding for wire records.
//!
//! Every record spells out its layout field by field instead of copying
//! its in-memory representation, so alignment and host endianness never
//! leak onto the wire.

use crate::ProtocolError;

/// Longest string a bounded string field may carry, in bytes.
pub const MAX_STRING_LEN: usize = 128;

/// A record with a fixed, explicit wire layout.
pub trait WireRecord: Sized {
    /// Appends the encoded record to `buf`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::StringTooLong`] if a bounded field
    /// exceeds its limit.
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError>;

    /// Decodes exactly one record from `bytes`.
    ///
    /// # Errors
    /// Fails if `bytes` is truncated, malformed or has trailing data.
    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError>;

    /// Encodes the record into a fresh buffer.
    ///
    /// # Errors
    /// Same as [`encode_into`](Self::encode_into).
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }
}

/// Cursor over a received payload.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.bytes.len() - self.pos;
        if remaining < len {
            return Err(ProtocolError::Truncated {
                needed: self.pos + len,
                actual: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a `u16` length prefix followed by that many UTF-8 bytes.
    pub(crate) fn read_string(&mut self) -> Result<String, ProtocolError> {
        let b = self.take(2)?;
        let len = u16::from_le_bytes([b[0], b[1]]) as usize;
        if len > MAX_STRING_LEN {
            return Err(ProtocolError::StringTooLong {
                len,
                max: MAX_STRING_LEN,
            });
        }
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Fails if any input is left.
    pub(crate) fn finish(self) -> Result<(), ProtocolError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

pub(crate) fn write_string(buf: &mut Vec<u8>, value: &str) -> Result<(), ProtocolError> {
    if value.len() > MAX_STRING_LEN {
        return Err(ProtocolError::StringTooLong {
            len: value.len(),
            max: MAX_STRING_LEN,
        });
    }
    buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Truncates `text` to at most [`MAX_STRING_LEN`] bytes on a char boundary.
pub fn clamp_string(text: &str) -> &str {
    if text.len() <= MAX_STRING_LEN {
        return text;
    }
    let mut end = MAX_STRING_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
