//! Frame header and receive-side sequencing.
//!
//! Every frame starts with a 4-byte header:
//!
//! ```text
//! +---------+----------+-----------------+---------
//! | version | pipeline | sequence (u16le) | payload
//! +---------+----------+-----------------+---------
//! ```

use crate::{Pipeline, TransportError};

/// Wire version written into every frame header.
pub const WIRE_VERSION: u8 = 1;

/// Largest payload a single frame may carry.
pub const MAX_PAYLOAD_SIZE: usize = 1400;

/// Per-frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) pipeline: Pipeline,
    pub(crate) sequence: u16,
}

impl FrameHeader {
    pub(crate) const LEN: usize = 4;

    /// Builds a complete frame: header followed by `payload`.
    pub(crate) fn frame(self, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(Self::LEN + payload.len());
        frame.push(WIRE_VERSION);
        frame.push(self.pipeline.to_byte());
        frame.extend_from_slice(&self.sequence.to_le_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Splits a received frame into its header and payload.
    pub(crate) fn split(frame: &[u8]) -> Result<(Self, &[u8]), TransportError> {
        if frame.len() < Self::LEN {
            return Err(TransportError::InvalidFrame(format!(
                "{} bytes is shorter than the header",
                frame.len()
            )));
        }
        if frame[0] != WIRE_VERSION {
            return Err(TransportError::InvalidFrame(format!(
                "wire version {} (expected {WIRE_VERSION})",
                frame[0]
            )));
        }
        let pipeline = Pipeline::from_byte(frame[1]).ok_or_else(|| {
            TransportError::InvalidFrame(format!("unknown pipeline {}", frame[1]))
        })?;
        let sequence = u16::from_le_bytes([frame[2], frame[3]]);
        Ok((Self { pipeline, sequence }, &frame[Self::LEN..]))
    }
}

/// `true` if `s1` is newer than `s2`, accounting for wrap-around.
pub(crate) fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    const HALF: u16 = u16::MAX / 2 + 1;
    (s1 > s2 && s1 - s2 <= HALF) || (s1 < s2 && s2 - s1 > HALF)
}

/// Drops unreliable frames that are not newer than the last delivered one.
#[derive(Debug, Default)]
pub(crate) struct SequenceFilter {
    last: Option<u16>,
}

impl SequenceFilter {
    pub(crate) fn accept(&mut self, sequence: u16) -> bool {
        match self.last {
            Some(last) if !sequence_greater_than(sequence, last) => false,
            _ => {
                self.last = Some(sequence);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_split_returns_header_and_payload() {
        let header = FrameHeader {
            pipeline: Pipeline::UnreliableSequenced,
            sequence: 513,
        };
        let frame = header.frame(b"abc");
        assert_eq!(&frame[..4], &[WIRE_VERSION, 1, 0x01, 0x02]);

        let (parsed, payload) = FrameHeader::split(&frame).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn test_frame_split_short_frame_fails() {
        assert!(FrameHeader::split(&[WIRE_VERSION, 0]).is_err());
    }

    #[test]
    fn test_frame_split_wrong_version_fails() {
        assert!(FrameHeader::split(&[9, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_frame_split_unknown_pipeline_fails() {
        assert!(FrameHeader::split(&[WIRE_VERSION, 5, 0, 0]).is_err());
    }

    #[test]
    fn test_sequence_greater_than_handles_wrap() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(sequence_greater_than(0, u16::MAX));
        assert!(!sequence_greater_than(u16::MAX, 0));
        assert!(!sequence_greater_than(7, 7));
    }

    #[test]
    fn test_sequence_filter_drops_stale_and_duplicate() {
        let mut filter = SequenceFilter::default();
        assert!(filter.accept(10));
        assert!(!filter.accept(10));
        assert!(!filter.accept(9));
        assert!(filter.accept(12));
        assert!(!filter.accept(11));
    }
}
