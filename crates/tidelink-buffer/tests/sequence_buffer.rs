//! Behavioural tests for the sequenced ring buffer.

use tidelink_buffer::SequenceBuffer;
use tidelink_protocol::{Command, Snapshot};

const N: u32 = 5;

fn buffer() -> SequenceBuffer<Snapshot> {
    SequenceBuffer::new(N as usize).unwrap()
}

// =========================================================================
// Slot collisions
// =========================================================================

#[test]
fn test_set_older_after_newer_same_slot_is_ignored() {
    let mut buffer = buffer();
    let (s1, s2) = (2, 2 + N);

    assert!(buffer.set(Snapshot::new(s2, 200)));
    assert!(!buffer.set(Snapshot::new(s1, 100)));

    assert!(buffer.get(s1).is_none());
    assert_eq!(buffer.get(s2), Some(&Snapshot::new(s2, 200)));
}

#[test]
fn test_set_newer_evicts_older_same_slot() {
    let mut buffer = buffer();
    buffer.set(Snapshot::new(1, 10));
    buffer.set(Snapshot::new(1 + N, 20));

    assert!(!buffer.contains(1));
    assert!(buffer.contains(1 + N));
}

#[test]
fn test_set_same_value_twice_returns_it_exactly() {
    let mut buffer = buffer();
    let value = Snapshot::new(5, 77);
    buffer.set(value);
    buffer.set(value);

    assert_eq!(buffer.get(5), Some(&value));
    assert_eq!(buffer.iter().filter(|s| s.sequence == 5).count(), 1);
}

// =========================================================================
// Capacity bound
// =========================================================================

#[test]
fn test_at_most_capacity_sequences_retrievable() {
    let mut buffer = buffer();
    for seq in 0..20 {
        buffer.set(Snapshot::new(seq, seq * 10));
    }

    let present: Vec<u32> = (0..20).filter(|s| buffer.contains(*s)).collect();
    assert_eq!(present, vec![15, 16, 17, 18, 19]);
    assert_eq!(buffer.len(), N as usize);
    assert_eq!(buffer.iter().count(), N as usize);
}

#[test]
fn test_superseded_old_sequence_never_returns() {
    let mut buffer = buffer();
    for seq in 0..=12 {
        buffer.set(Snapshot::new(seq, 0));
    }
    let max = buffer.latest().unwrap();

    for seq in 0..max.saturating_sub(N) {
        assert!(buffer.get(seq).is_none(), "sequence {seq} should be gone");
    }
    // A late, reordered arrival cannot resurrect an evicted sequence.
    assert!(!buffer.set(Snapshot::new(3, 0)));
    assert!(buffer.get(3).is_none());
}

#[test]
fn test_get_never_written_sequence_is_not_present() {
    let mut buffer = buffer();
    buffer.set(Snapshot::new(0, 1));
    assert!(buffer.get(N).is_none());
    assert!(buffer.get(1).is_none());
}

// =========================================================================
// Generic over any sequenced record
// =========================================================================

#[test]
fn test_buffer_holds_commands() {
    let mut commands = SequenceBuffer::new(2).unwrap();
    commands.set(Command::new(0, 1));
    commands.set(Command::new(1, 3));
    commands.set(Command::new(2, 2));

    assert!(commands.get(0).is_none());
    assert_eq!(commands.get(1), Some(&Command::new(1, 3)));
    assert_eq!(commands.get(2), Some(&Command::new(2, 2)));
}

#[test]
fn test_large_sequence_numbers_wrap_into_slots() {
    let mut buffer = buffer();
    buffer.set(Snapshot::new(u32::MAX, 1));
    assert_eq!(buffer.get(u32::MAX), Some(&Snapshot::new(u32::MAX, 1)));
    assert_eq!(buffer.latest(), Some(u32::MAX));
}
