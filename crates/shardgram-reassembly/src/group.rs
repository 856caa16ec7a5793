use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use shardgram_frame::Fragment;

/// Result of routing one fragment into a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The fragment opened a new group.
    Created { ready: bool },
    /// The fragment joined an existing group.
    Appended { ready: bool },
    /// The group already holds this sequence; the fragment was dropped.
    Duplicate,
    /// The sequence lies outside the group's fragment count; the fragment was dropped.
    Rejected,
}

impl EnqueueOutcome {
    /// Whether this fragment was the one that completed its group.
    pub fn completed(&self) -> bool {
        matches!(
            self,
            EnqueueOutcome::Created { ready: true } | EnqueueOutcome::Appended { ready: true }
        )
    }
}

/// A fully reassembled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledMessage {
    pub message_id: u64,
    pub session_id: u32,
    pub total_fragments: u16,
    pub payload: Bytes,
}

/// Receiver-side accumulator for the fragments of one message.
///
/// The fragment list sits behind the group's own mutex; the received count
/// and byte size are atomics so readiness can be tested without locking.
#[derive(Debug)]
pub struct FragmentGroup {
    message_id: u64,
    session_id: u32,
    total_fragments: u16,
    received: AtomicU32,
    size: AtomicU64,
    slots: Mutex<Slots>,
}

#[derive(Debug)]
struct Slots {
    fragments: Vec<Fragment>,
    seen: Vec<u64>,
}

impl Slots {
    /// Mark `sequence` as held; false if it already was.
    fn mark(&mut self, sequence: u16) -> bool {
        let word = &mut self.seen[sequence as usize / 64];
        let bit = 1u64 << (sequence % 64);
        if *word & bit != 0 {
            return false;
        }
        *word |= bit;
        true
    }
}

impl FragmentGroup {
    /// Open a group seeded with its first fragment.
    ///
    /// `first` must have a consistent header; [`GroupTable::insert_or_route`]
    /// rejects the rest before a group is made.
    ///
    /// [`GroupTable::insert_or_route`]: crate::table::GroupTable::insert_or_route
    pub fn new(first: Fragment) -> Self {
        let total = first.header.total_fragments;
        let group = Self {
            message_id: first.header.message_id,
            session_id: first.header.session_id,
            total_fragments: total,
            received: AtomicU32::new(0),
            size: AtomicU64::new(0),
            slots: Mutex::new(Slots {
                fragments: Vec::with_capacity(total as usize),
                seen: vec![0; (total as usize).div_ceil(64).max(1)],
            }),
        };
        group.enqueue(first);
        group
    }

    /// Add a fragment. `Appended { ready: true }` is returned exactly once,
    /// by the enqueue that completes the group.
    pub fn enqueue(&self, fragment: Fragment) -> EnqueueOutcome {
        let sequence = fragment.header.sequence_in_message;
        if sequence >= self.total_fragments {
            return EnqueueOutcome::Rejected;
        }

        let len = fragment.payload.len() as u64;
        let mut slots = self.slots.lock();
        if !slots.mark(sequence) {
            return EnqueueOutcome::Duplicate;
        }
        slots.fragments.push(fragment);
        drop(slots);

        self.size.fetch_add(len, Ordering::Relaxed);
        let received = self.received.fetch_add(1, Ordering::AcqRel) + 1;
        EnqueueOutcome::Appended {
            ready: received == u32::from(self.total_fragments),
        }
    }

    /// True once every fragment of the message is held.
    pub fn is_ready(&self) -> bool {
        self.received.load(Ordering::Acquire) == u32::from(self.total_fragments)
    }

    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn total_fragments(&self) -> u16 {
        self.total_fragments
    }

    /// Distinct fragments received so far.
    pub fn received(&self) -> u32 {
        self.received.load(Ordering::Acquire)
    }

    /// Total payload size, known only once the group is ready.
    pub fn size_if_ready(&self) -> Option<u64> {
        self.is_ready().then(|| self.size.load(Ordering::Relaxed))
    }

    /// Concatenate the payloads in sequence order.
    ///
    /// Only called on a ready group already removed from its table, so no
    /// enqueue can race with it.
    pub(crate) fn assemble(&self) -> ReassembledMessage {
        let mut slots = self.slots.lock();
        slots
            .fragments
            .sort_unstable_by_key(|f| f.header.sequence_in_message);

        let payload = match slots.fragments.as_slice() {
            [only] => only.payload.clone(),
            fragments => {
                let size = self.size.load(Ordering::Relaxed) as usize;
                let mut buf = BytesMut::with_capacity(size);
                for fragment in fragments {
                    buf.extend_from_slice(&fragment.payload);
                }
                buf.freeze()
            }
        };

        ReassembledMessage {
            message_id: self.message_id,
            session_id: self.session_id,
            total_fragments: self.total_fragments,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use shardgram_frame::FragmentHeader;

    use super::*;

    fn fragment(message_id: u64, sequence: u16, total: u16, payload: &'static [u8]) -> Fragment {
        Fragment::new(
            FragmentHeader {
                session_id: 1234,
                sequence_in_message: sequence,
                total_fragments: total,
                message_id,
            },
            payload,
        )
    }

    #[test]
    fn single_fragment_group_is_ready_immediately() {
        let group = FragmentGroup::new(fragment(1, 0, 1, b"solo"));
        assert!(group.is_ready());
        assert_eq!(group.size_if_ready(), Some(4));
        assert_eq!(group.assemble().payload.as_ref(), b"solo");
    }

    #[test]
    fn readiness_gated_on_last_fragment() {
        let group = FragmentGroup::new(fragment(5, 2, 3, b"c"));
        assert!(!group.is_ready());
        assert_eq!(group.size_if_ready(), None);

        assert_eq!(
            group.enqueue(fragment(5, 0, 3, b"a")),
            EnqueueOutcome::Appended { ready: false }
        );
        assert!(!group.is_ready());

        assert_eq!(
            group.enqueue(fragment(5, 1, 3, b"b")),
            EnqueueOutcome::Appended { ready: true }
        );
        assert!(group.is_ready());
        assert_eq!(group.size_if_ready(), Some(3));
    }

    #[test]
    fn assemble_orders_by_sequence() {
        let group = FragmentGroup::new(fragment(9, 3, 4, b"D"));
        group.enqueue(fragment(9, 1, 4, b"B"));
        group.enqueue(fragment(9, 0, 4, b"A"));
        group.enqueue(fragment(9, 2, 4, b"C"));

        let message = group.assemble();
        assert_eq!(message.message_id, 9);
        assert_eq!(message.total_fragments, 4);
        assert_eq!(message.payload.as_ref(), b"ABCD");
    }

    #[test]
    fn duplicate_does_not_inflate_count() {
        let group = FragmentGroup::new(fragment(2, 0, 2, b"x"));
        assert_eq!(
            group.enqueue(fragment(2, 0, 2, b"x")),
            EnqueueOutcome::Duplicate
        );
        assert_eq!(group.received(), 1);
        assert!(!group.is_ready());
    }

    #[test]
    fn out_of_range_sequence_rejected() {
        let group = FragmentGroup::new(fragment(3, 0, 2, b"x"));
        assert_eq!(
            group.enqueue(fragment(3, 5, 8, b"y")),
            EnqueueOutcome::Rejected
        );
        assert_eq!(group.received(), 1);
    }

    #[test]
    fn bitmap_covers_high_sequences() {
        let group = FragmentGroup::new(fragment(4, 64, 130, b""));
        assert_eq!(
            group.enqueue(fragment(4, 129, 130, b"")),
            EnqueueOutcome::Appended { ready: false }
        );
        assert_eq!(
            group.enqueue(fragment(4, 129, 130, b"")),
            EnqueueOutcome::Duplicate
        );
        assert_eq!(group.received(), 2);
    }

    #[test]
    fn concurrent_enqueue_completes_once() {
        use std::sync::Arc;

        let group = Arc::new(FragmentGroup::new(fragment(7, 0, 64, b"")));
        let handles: Vec<_> = (0..4u16)
            .map(|t| {
                let group = Arc::clone(&group);
                std::thread::spawn(move || {
                    (1..64u16)
                        .filter(|s| s % 4 == t)
                        .filter(|s| group.enqueue(fragment(7, *s, 64, b"z")).completed())
                        .count()
                })
            })
            .collect();

        let completions: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(completions, 1);
        assert!(group.is_ready());
        assert_eq!(group.size_if_ready(), Some(63));
    }
}
