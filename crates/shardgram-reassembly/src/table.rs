use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use shardgram_frame::Fragment;
use tracing::{debug, trace};

use crate::group::{EnqueueOutcome, FragmentGroup, ReassembledMessage};

/// A message handed out by [`GroupTable::take_ready`].
#[derive(Debug)]
pub struct Delivery {
    pub message: ReassembledMessage,
    /// Incomplete groups older than the delivered one that were discarded.
    pub stale_dropped: usize,
}

/// Live fragment groups ordered by ascending message id, bounded to a window.
///
/// Lock order is always table then group. Fragments are enqueued while the
/// table lock is held (shared for existing groups), so a group that has left
/// the table is never mutated again.
#[derive(Debug)]
pub struct GroupTable {
    groups: RwLock<VecDeque<Arc<FragmentGroup>>>,
    window: usize,
}

impl GroupTable {
    /// Create a table holding at most `window` groups after each eviction check.
    pub fn new(window: usize) -> Self {
        Self {
            groups: RwLock::new(VecDeque::with_capacity(window + 1)),
            window,
        }
    }

    /// Find the live group for `message_id`.
    pub fn lookup(&self, message_id: u64) -> Option<Arc<FragmentGroup>> {
        let groups = self.groups.read();
        find(&groups, message_id).map(|idx| Arc::clone(&groups[idx]))
    }

    /// Route a fragment into its group, creating the group on first sight.
    ///
    /// A fragment whose header could never complete a message (zero total,
    /// or sequence past the total) is `Rejected` and opens no group.
    pub fn insert_or_route(&self, fragment: Fragment) -> EnqueueOutcome {
        if !fragment.header.is_consistent() {
            return EnqueueOutcome::Rejected;
        }
        let message_id = fragment.header.message_id;
        {
            let groups = self.groups.read();
            if let Some(idx) = find(&groups, message_id) {
                return groups[idx].enqueue(fragment);
            }
        }

        let mut groups = self.groups.write();
        match groups.binary_search_by_key(&message_id, |g| g.message_id()) {
            // Another worker created it between the two locks.
            Ok(idx) => groups[idx].enqueue(fragment),
            Err(idx) => {
                let group = FragmentGroup::new(fragment);
                let ready = group.is_ready();
                trace!(
                    message_id,
                    total = group.total_fragments(),
                    "group created"
                );
                groups.insert(idx, Arc::new(group));
                EnqueueOutcome::Created { ready }
            }
        }
    }

    /// Drop the oldest groups until at most `window` remain, ready or not.
    ///
    /// Returns the number of groups evicted.
    pub fn evict_if_overflowing(&self) -> usize {
        if self.groups.read().len() <= self.window {
            return 0;
        }

        let mut groups = self.groups.write();
        let mut evicted = 0;
        while groups.len() > self.window {
            let Some(group) = groups.pop_front() else {
                break;
            };
            debug!(
                message_id = group.message_id(),
                received = group.received(),
                total = group.total_fragments(),
                "group evicted from window"
            );
            evicted += 1;
        }
        evicted
    }

    /// Remove the oldest ready group and assemble it.
    ///
    /// With `drop_stale`, every group older than the delivered one is
    /// discarded as well. Assembly happens after the table lock is released.
    pub fn take_ready(&self, drop_stale: bool) -> Option<Delivery> {
        if !self.has_ready() {
            return None;
        }

        let (group, stale_dropped) = {
            let mut groups = self.groups.write();
            let idx = groups.iter().position(|g| g.is_ready())?;
            let group = groups.remove(idx)?;
            let stale_dropped = if drop_stale && idx > 0 {
                for stale in groups.drain(..idx) {
                    debug!(
                        message_id = stale.message_id(),
                        received = stale.received(),
                        total = stale.total_fragments(),
                        "stale group dropped"
                    );
                }
                idx
            } else {
                0
            };
            (group, stale_dropped)
        };

        let message = group.assemble();
        trace!(
            message_id = message.message_id,
            len = message.payload.len(),
            "message reassembled"
        );
        Some(Delivery {
            message,
            stale_dropped,
        })
    }

    /// Whether any live group is complete.
    pub fn has_ready(&self) -> bool {
        self.groups.read().iter().any(|g| g.is_ready())
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Snapshot of live message ids in table order.
    pub fn message_ids(&self) -> Vec<u64> {
        self.groups.read().iter().map(|g| g.message_id()).collect()
    }

    /// Discard every live group.
    pub fn clear(&self) {
        self.groups.write().clear();
    }
}

fn find(groups: &VecDeque<Arc<FragmentGroup>>, message_id: u64) -> Option<usize> {
    groups
        .binary_search_by_key(&message_id, |g| g.message_id())
        .ok()
}
