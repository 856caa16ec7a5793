use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free receive counters shared by all ingestion workers.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    datagrams: AtomicU64,
    malformed: AtomicU64,
    inconsistent: AtomicU64,
    session_mismatches: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    groups_created: AtomicU64,
    groups_evicted: AtomicU64,
    messages_delivered: AtomicU64,
    stale_dropped: AtomicU64,
    recv_errors: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub malformed: u64,
    pub inconsistent: u64,
    pub session_mismatches: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub groups_created: u64,
    pub groups_evicted: u64,
    pub messages_delivered: u64,
    pub stale_dropped: u64,
    pub recv_errors: u64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $record(&self, n: u64) {
                self.$field.fetch_add(n, Ordering::Relaxed);
            }
        )*
    };
}

impl ReceiverStats {
    counter! {
        record_datagram => datagrams,
        record_malformed => malformed,
        record_inconsistent => inconsistent,
        record_session_mismatch => session_mismatches,
        record_duplicate => duplicates,
        record_rejected => rejected,
        record_group_created => groups_created,
        record_evicted => groups_evicted,
        record_delivered => messages_delivered,
        record_stale_dropped => stale_dropped,
        record_recv_error => recv_errors,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            inconsistent: self.inconsistent.load(Ordering::Relaxed),
            session_mismatches: self.session_mismatches.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            groups_created: self.groups_created.load(Ordering::Relaxed),
            groups_evicted: self.groups_evicted.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Datagrams dropped before reaching any group.
    pub fn discarded(&self) -> u64 {
        self.malformed + self.inconsistent + self.session_mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_records() {
        let stats = ReceiverStats::default();
        stats.record_datagram(3);
        stats.record_malformed(1);
        stats.record_session_mismatch(1);
        stats.record_evicted(2);

        let snap = stats.snapshot();
        assert_eq!(snap.datagrams, 3);
        assert_eq!(snap.groups_evicted, 2);
        assert_eq!(snap.discarded(), 2);
        assert_eq!(snap.messages_delivered, 0);
    }

    #[test]
    fn snapshot_serializes_field_names() {
        let snap = StatsSnapshot {
            groups_evicted: 4,
            ..StatsSnapshot::default()
        };
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["groups_evicted"], 4);
        assert_eq!(json["datagrams"], 0);
    }
}
