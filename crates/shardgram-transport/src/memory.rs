use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::error::{Result, TransportError};
use crate::traits::DatagramChannel;

/// Largest datagram a [`MemoryChannel`] accepts by default (IPv4 UDP limit).
pub const DEFAULT_MAX_DATAGRAM: usize = 65_507;

/// In-process datagram channel.
///
/// [`MemoryChannel::pair`] returns two connected ends: datagrams sent on one
/// are received on the other. Delivery is lossless and in order unless the
/// caller reorders or drops datagrams itself, which makes it the channel of
/// choice for deterministic reassembly tests. Both ends are `Sync`, so many
/// workers may receive from one end concurrently.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    recv_timeout: Duration,
    max_datagram: usize,
}

impl MemoryChannel {
    /// Create two connected ends sharing the same receive timeout.
    pub fn pair(recv_timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = channel::unbounded();
        let (b_tx, a_rx) = channel::unbounded();
        (
            Self {
                tx: a_tx,
                rx: a_rx,
                recv_timeout,
                max_datagram: DEFAULT_MAX_DATAGRAM,
            },
            Self {
                tx: b_tx,
                rx: b_rx,
                recv_timeout,
                max_datagram: DEFAULT_MAX_DATAGRAM,
            },
        )
    }

    /// Cap the datagram size accepted by `send` on this end.
    pub fn with_max_datagram(mut self, max_datagram: usize) -> Self {
        self.max_datagram = max_datagram;
        self
    }

    /// Number of datagrams queued for this end to receive.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Pull one queued datagram without waiting.
    pub fn try_take(&self) -> Option<Bytes> {
        self.rx.try_recv().ok()
    }
}

impl DatagramChannel for MemoryChannel {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        if datagram.len() > self.max_datagram {
            return Err(TransportError::DatagramTooLarge {
                size: datagram.len(),
                max: self.max_datagram,
            });
        }
        self.tx
            .send(Bytes::copy_from_slice(datagram))
            .map_err(|_| TransportError::Closed)?;
        Ok(datagram.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.rx.recv_timeout(self.recv_timeout) {
            Ok(datagram) => {
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                Ok(Some(n))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}
