//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire records.
///
/// A decode error only ever concerns one frame: the caller logs it and
/// drops that frame, the connection stays up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The input ended before the record was complete.
    #[error("truncated record: needed {needed} bytes, got {actual}")]
    Truncated {
        /// Bytes required to continue decoding.
        needed: usize,
        /// Bytes that were available.
        actual: usize,
    },

    /// Bytes were left over after a fixed-size record.
    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    /// The control opcode is not one we know.
    #[error("unknown control opcode {0}")]
    UnknownOpcode(u8),

    /// A bounded string exceeds its limit.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong {
        /// Length of the offending string.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// A string field is not valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
}
