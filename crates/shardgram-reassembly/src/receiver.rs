use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use shardgram_frame::{decode_fragment, FrameError, MAX_MTU};
use shardgram_transport::{DatagramChannel, TransportError, UdpChannel, UdpOptions};
use tracing::{debug, info, trace, warn};

use crate::config::ReceiverConfig;
use crate::error::{ReassemblyError, Result};
use crate::group::{EnqueueOutcome, ReassembledMessage};
use crate::notify::ReadyNotifier;
use crate::stats::{ReceiverStats, StatsSnapshot};
use crate::table::GroupTable;

/// State shared between the receiver handle and its workers.
struct Shared<C> {
    channel: C,
    table: GroupTable,
    stats: ReceiverStats,
    notifier: ReadyNotifier,
    config: ReceiverConfig,
    shutdown: AtomicBool,
}

impl<C: DatagramChannel> Shared<C> {
    fn ingest(&self, datagram: Bytes) {
        self.stats.record_datagram(1);

        let fragment = match decode_fragment(datagram) {
            Ok(fragment) => fragment,
            Err(FrameError::InconsistentFragment { sequence, total }) => {
                trace!(sequence, total, "inconsistent fragment dropped");
                self.stats.record_inconsistent(1);
                return;
            }
            Err(err) => {
                trace!(error = %err, "malformed datagram dropped");
                self.stats.record_malformed(1);
                return;
            }
        };

        if let Some(expected) = self.config.session_filter {
            if fragment.header.session_id != expected {
                trace!(
                    session_id = fragment.header.session_id,
                    expected,
                    "fragment from foreign session dropped"
                );
                self.stats.record_session_mismatch(1);
                return;
            }
        }

        let outcome = self.table.insert_or_route(fragment);
        match outcome {
            EnqueueOutcome::Created { .. } => self.stats.record_group_created(1),
            EnqueueOutcome::Appended { .. } => {}
            EnqueueOutcome::Duplicate => self.stats.record_duplicate(1),
            EnqueueOutcome::Rejected => self.stats.record_rejected(1),
        }
        if outcome.completed() {
            self.notifier.notify();
        }

        let evicted = self.table.evict_if_overflowing();
        if evicted > 0 {
            self.stats.record_evicted(evicted as u64);
        }
    }

    fn run_worker(&self, index: usize) {
        let backoff = self.config.idle_backoff + Duration::from_micros(index as u64);
        // One byte past the largest legal datagram, so oversize input is detectable.
        let mut buf = vec![0u8; MAX_MTU + 1];
        debug!(worker = index, "ingestion worker started");

        while !self.shutdown.load(Ordering::Acquire) {
            match self.channel.recv(&mut buf) {
                Ok(Some(n)) if n > self.config.mtu => {
                    trace!(len = n, mtu = self.config.mtu, "oversize datagram dropped");
                    self.stats.record_datagram(1);
                    self.stats.record_malformed(1);
                }
                Ok(Some(n)) => self.ingest(Bytes::copy_from_slice(&buf[..n])),
                Ok(None) => thread::sleep(backoff),
                Err(TransportError::Closed) => {
                    debug!(worker = index, "channel closed, worker exiting");
                    break;
                }
                Err(err) => {
                    self.stats.record_recv_error(1);
                    warn!(worker = index, error = %err, "receive failed");
                    thread::sleep(backoff);
                }
            }
        }

        debug!(worker = index, "ingestion worker stopped");
    }
}

/// Multi-worker reassembly receiver.
///
/// [`Receiver::start`] spawns a fixed pool of ingestion workers that pull
/// datagrams off one channel and route them into a windowed [`GroupTable`].
/// Completed messages are taken with [`read`](Receiver::read) (non-blocking)
/// or [`read_timeout`](Receiver::read_timeout).
///
/// Workers stop on [`shutdown`](Receiver::shutdown) or drop. Groups still in
/// flight are discarded.
pub struct Receiver<C: DatagramChannel + 'static> {
    shared: Arc<Shared<C>>,
    workers: Vec<JoinHandle<()>>,
}

impl<C: DatagramChannel + 'static> Receiver<C> {
    /// Validate `config` and spawn the ingestion workers on `channel`.
    pub fn start(channel: C, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let worker_count = config.workers;

        let shared = Arc::new(Shared {
            channel,
            table: GroupTable::new(config.window),
            stats: ReceiverStats::default(),
            notifier: ReadyNotifier::new(),
            config,
            shutdown: AtomicBool::new(false),
        });

        let mut receiver = Self {
            shared,
            workers: Vec::with_capacity(worker_count),
        };

        for index in 0..worker_count {
            let shared = Arc::clone(&receiver.shared);
            let spawned = thread::Builder::new()
                .name(format!("shardgram-rx-{index}"))
                .spawn(move || shared.run_worker(index));
            match spawned {
                Ok(handle) => receiver.workers.push(handle),
                Err(source) => {
                    receiver.shutdown();
                    return Err(ReassemblyError::Spawn { index, source });
                }
            }
        }

        info!(
            workers = receiver.shared.config.workers,
            window = receiver.shared.config.window,
            mtu = receiver.shared.config.mtu,
            "receiver started"
        );
        Ok(receiver)
    }

    /// Take the oldest completed message, if any (non-blocking).
    ///
    /// With `drop_stale`, incomplete groups older than the returned message
    /// are discarded.
    pub fn read(&self, drop_stale: bool) -> Option<ReassembledMessage> {
        let delivery = self.shared.table.take_ready(drop_stale)?;
        self.shared.stats.record_delivered(1);
        if delivery.stale_dropped > 0 {
            self.shared
                .stats
                .record_stale_dropped(delivery.stale_dropped as u64);
        }
        Some(delivery.message)
    }

    /// Like [`read`](Receiver::read), but wait up to `timeout` for a message
    /// to complete.
    pub fn read_timeout(
        &self,
        drop_stale: bool,
        timeout: Duration,
    ) -> Option<ReassembledMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.read(drop_stale) {
                return Some(message);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            self.shared.notifier.wait_timeout(remaining);
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of groups currently tracked.
    pub fn pending_groups(&self) -> usize {
        self.shared.table.len()
    }

    /// Live message ids in table order.
    pub fn pending_message_ids(&self) -> Vec<u64> {
        self.shared.table.message_ids()
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.shared.config
    }

    /// Borrow the channel the workers receive from.
    pub fn channel(&self) -> &C {
        &self.shared.channel
    }

    /// Whether workers are still running.
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Stop and join all workers. Idempotent.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.shared.shutdown.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("ingestion worker panicked");
            }
        }
        info!(
            pending_groups = self.shared.table.len(),
            "receiver stopped"
        );
    }
}

impl Receiver<UdpChannel> {
    /// Bind a UDP socket on `addr` and start receiving on it.
    ///
    /// The socket's receive timeout comes from [`ReceiverConfig::recv_timeout`].
    pub fn bind(addr: SocketAddr, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let options = UdpOptions {
            recv_timeout: Some(config.recv_timeout),
            ..UdpOptions::default()
        };
        let channel = UdpChannel::bind(addr, &options)?;
        Self::start(channel, config)
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.channel.local_addr()
    }
}

impl<C: DatagramChannel + 'static> Drop for Receiver<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<C: DatagramChannel + 'static> std::fmt::Debug for Receiver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.shared.config)
            .field("workers", &self.workers.len())
            .field("pending_groups", &self.shared.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use shardgram_frame::{FragmentConfig, FragmentSender};
    use shardgram_transport::MemoryChannel;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(workers: usize, window: usize) -> ReceiverConfig {
        ReceiverConfig {
            workers,
            window,
            ..ReceiverConfig::default()
        }
    }

    fn memory_pair() -> (MemoryChannel, MemoryChannel) {
        MemoryChannel::pair(Duration::from_millis(5))
    }

    #[test]
    fn delivers_single_and_multi_fragment_messages() {
        let (tx, rx) = memory_pair();
        let sender = FragmentSender::new(tx, FragmentConfig::default()).unwrap();
        let receiver = Receiver::start(rx, config(2, 16)).unwrap();

        let small = vec![1u8; 1000];
        let large: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        let first = sender.send(&small).unwrap();
        let second = sender.send(&large).unwrap();

        let mut got = vec![
            receiver.read_timeout(false, WAIT).unwrap(),
            receiver.read_timeout(false, WAIT).unwrap(),
        ];
        got.sort_by_key(|m| m.message_id);

        assert_eq!(got[0].message_id, first);
        assert_eq!(got[0].total_fragments, 1);
        assert_eq!(got[0].payload.as_ref(), small.as_slice());
        assert_eq!(got[1].message_id, second);
        assert_eq!(got[1].total_fragments, 3);
        assert_eq!(got[1].payload.as_ref(), large.as_slice());
    }

    #[test]
    fn read_does_not_block_when_empty() {
        let (_tx, rx) = memory_pair();
        let receiver = Receiver::start(rx, config(1, 4)).unwrap();

        let start = Instant::now();
        assert!(receiver.read(false).is_none());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn read_timeout_expires_without_traffic() {
        let (_tx, rx) = memory_pair();
        let receiver = Receiver::start(rx, config(1, 4)).unwrap();
        assert!(receiver
            .read_timeout(false, Duration::from_millis(20))
            .is_none());
    }

    #[test]
    fn malformed_and_foreign_datagrams_are_counted() {
        let (tx, rx) = memory_pair();
        let cfg = ReceiverConfig {
            session_filter: Some(1234),
            ..config(1, 4)
        };
        let receiver = Receiver::start(rx, cfg).unwrap();

        tx.send(&[0u8; 5]).unwrap();
        let foreign = FragmentSender::new(
            tx.clone(),
            FragmentConfig {
                session_id: 1,
                ..FragmentConfig::default()
            },
        )
        .unwrap();
        foreign.send(b"nope").unwrap();

        let local = FragmentSender::new(tx, FragmentConfig::default()).unwrap();
        local.send(b"yes").unwrap();

        let message = receiver.read_timeout(false, WAIT).unwrap();
        assert_eq!(message.payload.as_ref(), b"yes");

        let stats = receiver.stats();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.session_mismatches, 1);
        assert_eq!(stats.messages_delivered, 1);
    }

    #[test]
    fn datagrams_above_receiver_mtu_are_dropped() {
        let (tx, rx) = memory_pair();
        let wide = FragmentSender::new(
            tx.clone(),
            FragmentConfig {
                mtu: 4096,
                ..FragmentConfig::default()
            },
        )
        .unwrap();
        let receiver = Receiver::start(rx, config(2, 8)).unwrap();

        // 3000 bytes fit one 4096-byte fragment, far beyond the receiver's 1024.
        wide.send(&vec![7u8; 3000]).unwrap();
        let narrow = FragmentSender::new(tx, FragmentConfig::default()).unwrap();
        let payload = vec![9u8; 3000];
        narrow.send(&payload).unwrap();

        let message = receiver.read_timeout(false, WAIT).unwrap();
        assert_eq!(message.payload.as_ref(), payload.as_slice());
        assert!(receiver.read_timeout(false, Duration::from_millis(50)).is_none());

        let stats = receiver.stats();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.messages_delivered, 1);
        assert_eq!(stats.groups_created, 1);
    }

    #[test]
    fn smaller_sender_mtu_reassembles() {
        let (tx, rx) = memory_pair();
        let sender = FragmentSender::new(
            tx,
            FragmentConfig {
                mtu: 512,
                ..FragmentConfig::default()
            },
        )
        .unwrap();
        let receiver = Receiver::start(
            rx,
            ReceiverConfig {
                mtu: 4096,
                ..config(2, 8)
            },
        )
        .unwrap();

        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
        sender.send(&payload).unwrap();

        let message = receiver.read_timeout(false, WAIT).unwrap();
        assert_eq!(message.total_fragments, 11);
        assert_eq!(message.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn window_bounds_pending_groups() {
        let (tx, rx) = memory_pair();
        let fragmenter = shardgram_frame::Fragmenter::new(FragmentConfig::default()).unwrap();
        let receiver = Receiver::start(rx, config(1, 4)).unwrap();

        // First fragment only, so no group ever completes.
        for _ in 0..10 {
            let batch = fragmenter.fragment(&[0u8; 3000]).unwrap();
            tx.send(&batch.datagrams[0]).unwrap();
        }

        let deadline = Instant::now() + WAIT;
        while receiver.stats().groups_evicted < 6 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(receiver.pending_message_ids(), vec![7, 8, 9, 10]);
        assert_eq!(receiver.stats().groups_evicted, 6);
    }

    #[test]
    fn shutdown_joins_workers_and_is_idempotent() {
        let (_tx, rx) = memory_pair();
        let mut receiver = Receiver::start(rx, config(4, 4)).unwrap();
        assert!(receiver.is_running());

        receiver.shutdown();
        assert!(!receiver.is_running());
        receiver.shutdown();
    }

    #[test]
    fn invalid_config_spawns_nothing() {
        let (_tx, rx) = memory_pair();
        let err = Receiver::start(rx, config(0, 4)).unwrap_err();
        assert!(matches!(err, ReassemblyError::InvalidConfig(_)));
    }

    #[test]
    fn closed_channel_stops_workers() {
        let (tx, rx) = memory_pair();
        let mut receiver = Receiver::start(rx, config(2, 4)).unwrap();
        drop(tx);
        receiver.shutdown();
        assert_eq!(receiver.stats().recv_errors, 0);
    }

    #[test]
    fn udp_loopback_roundtrip() {
        let receiver = Receiver::bind(
            "127.0.0.1:0".parse().unwrap(),
            ReceiverConfig {
                recv_timeout: Duration::from_millis(20),
                ..config(2, 8)
            },
        )
        .unwrap();

        let channel =
            UdpChannel::connect(receiver.local_addr(), &UdpOptions::default()).unwrap();
        let sender = FragmentSender::new(channel, FragmentConfig::default()).unwrap();
        let payload = vec![0x42u8; 2500];
        sender.send(&payload).unwrap();

        let message = receiver.read_timeout(false, WAIT).unwrap();
        assert_eq!(message.payload.as_ref(), payload.as_slice());
    }
}
