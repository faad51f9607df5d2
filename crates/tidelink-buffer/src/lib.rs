//! Fixed-capacity ring buffer keyed by sequence number.
//!
//! A [`SequenceBuffer`] holds the most recent values of a stream of
//! [`Sequenced`] records (typically snapshots) in bounded memory. The
//! slot for a value is `sequence % capacity`.
//!
//! # Rules
//!
//! - A write is accepted only if its sequence is ≥ the sequence already
//!   recorded for that slot. Equal sequences overwrite; strictly older
//!   ones are ignored, so reordered delivery never regresses a slot.
//! - A read succeeds only if the slot's recorded sequence equals the
//!   requested one exactly. A miss means the value was evicted or never
//!   arrived; callers treat it as routine.
//!
//! ```
//! use tidelink_buffer::SequenceBuffer;
//! use tidelink_protocol::Snapshot;
//!
//! let mut buffer = SequenceBuffer::new(4).unwrap();
//! buffer.set(Snapshot::new(1, 10));
//! buffer.set(Snapshot::new(5, 50)); // same slot as 1
//! assert!(buffer.get(1).is_none());
//! assert_eq!(buffer.get(5), Some(&Snapshot::new(5, 50)));
//! ```

pub use tidelink_protocol::Sequenced;

/// Fixed-capacity, monotonic-overwrite cache of sequenced values.
#[derive(Debug, Clone)]
pub struct SequenceBuffer<T> {
    values: Vec<Option<T>>,
    /// Last sequence written to each slot; `None` until the first write.
    sequences: Vec<Option<u32>>,
    latest: Option<u32>,
}

impl<T: Sequenced + Clone> SequenceBuffer<T> {
    /// Creates a buffer with `capacity` slots.
    ///
    /// Returns `None` if `capacity` is zero.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(Self {
            values: vec![None; capacity],
            sequences: vec![None; capacity],
            latest: None,
        })
    }

    fn slot(&self, sequence: u32) -> usize {
        sequence as usize % self.values.len()
    }

    /// Stores `value` in its slot.
    ///
    /// Returns `false` (and leaves the buffer untouched) if the slot
    /// already holds a strictly newer sequence.
    pub fn set(&mut self, value: T) -> bool {
        let sequence = value.sequence();
        let slot = self.slot(sequence);
        if let Some(stored) = self.sequences[slot] {
            if sequence < stored {
                tracing::trace!(sequence, stored, "stale write ignored");
                return false;
            }
        }
        self.sequences[slot] = Some(sequence);
        self.values[slot] = Some(value);
        if self.latest.is_none_or(|latest| sequence > latest) {
            self.latest = Some(sequence);
        }
        true
    }

    /// Returns the value for `sequence` if its slot still holds exactly it.
    pub fn get(&self, sequence: u32) -> Option<&T> {
        let slot = self.slot(sequence);
        match self.sequences[slot] {
            Some(stored) if stored == sequence => self.values[slot].as_ref(),
            _ => None,
        }
    }

    /// `true` if [`get`](Self::get) would return a value.
    pub fn contains(&self, sequence: u32) -> bool {
        self.get(sequence).is_some()
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Highest sequence accepted since creation or the last [`clear`](Self::clear).
    pub fn latest(&self) -> Option<u32> {
        self.latest
    }

    /// The value for [`latest`](Self::latest), if present.
    pub fn latest_value(&self) -> Option<&T> {
        self.latest.and_then(|sequence| self.get(sequence))
    }

    /// Iterates the present values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter().flatten()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.sequences.iter().filter(|s| s.is_some()).count()
    }

    /// `true` if nothing has been written since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    /// Resets every slot to "never written".
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = None);
        self.sequences.iter_mut().for_each(|s| *s = None);
        self.latest = None;
    }
}
