use std::sync::Arc;

use crate::error::Result;

/// An unreliable, message-boundary-preserving datagram channel.
///
/// One `send` call transmits exactly one datagram and one `recv` call yields
/// at most one. Implementations must be shareable across threads: the
/// receiver runs several ingestion workers against a single channel.
pub trait DatagramChannel: Send + Sync {
    /// Transmit one datagram. Returns the number of bytes sent.
    fn send(&self, datagram: &[u8]) -> Result<usize>;

    /// Receive one datagram into `buf`.
    ///
    /// Blocks for at most the channel's receive timeout. Returns `Ok(None)`
    /// when the timeout elapsed without data so callers can observe shutdown.
    /// A datagram longer than `buf` is truncated to `buf.len()`.
    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>>;
}

impl<T: DatagramChannel + ?Sized> DatagramChannel for Arc<T> {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        (**self).send(datagram)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        (**self).recv(buf)
    }
}

impl<T: DatagramChannel + ?Sized> DatagramChannel for &T {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        (**self).send(datagram)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        (**self).recv(buf)
    }
}
