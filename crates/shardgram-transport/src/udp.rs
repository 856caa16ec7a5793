use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::sockopt::{self, BufferKind};
use crate::traits::DatagramChannel;

/// Default receive timeout so blocked workers can observe shutdown.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Default kernel receive buffer: 32 MiB.
pub const DEFAULT_RECV_BUFFER: usize = 32 * 1024 * 1024;

/// Default kernel send buffer: 4 MiB.
pub const DEFAULT_SEND_BUFFER: usize = 4 * 1024 * 1024;

/// Socket tuning applied when a [`UdpChannel`] is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpOptions {
    /// Receive timeout. `None` blocks forever, which keeps workers from
    /// noticing shutdown; leave it set for receivers.
    pub recv_timeout: Option<Duration>,
    /// Requested `SO_RCVBUF`. `None` keeps the kernel default.
    pub recv_buffer_size: Option<usize>,
    /// Requested `SO_SNDBUF`. `None` keeps the kernel default.
    pub send_buffer_size: Option<usize>,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self {
            recv_timeout: Some(DEFAULT_RECV_TIMEOUT),
            recv_buffer_size: Some(DEFAULT_RECV_BUFFER),
            send_buffer_size: Some(DEFAULT_SEND_BUFFER),
        }
    }
}

/// UDP datagram channel.
///
/// A receiving channel is created with [`UdpChannel::bind`]; a sending channel
/// with [`UdpChannel::connect`], which binds an ephemeral local port and fixes
/// the destination so `send` needs no address.
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer_addr: Option<SocketAddr>,
}

impl UdpChannel {
    /// Bind a receiving channel on `addr`.
    pub fn bind(addr: SocketAddr, options: &UdpOptions) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let channel = Self::from_socket(socket, None, options)?;
        info!(addr = %channel.local_addr, "listening on udp socket");
        Ok(channel)
    }

    /// Create a sending channel whose datagrams go to `peer`.
    pub fn connect(peer: SocketAddr, options: &UdpOptions) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local.to_string(),
            source,
        })?;
        socket
            .connect(peer)
            .map_err(|source| TransportError::Connect {
                addr: peer.to_string(),
                source,
            })?;
        let channel = Self::from_socket(socket, Some(peer), options)?;
        debug!(local = %channel.local_addr, %peer, "udp channel connected");
        Ok(channel)
    }

    fn from_socket(
        socket: UdpSocket,
        peer_addr: Option<SocketAddr>,
        options: &UdpOptions,
    ) -> Result<Self> {
        let local_addr = socket.local_addr()?;
        socket.set_read_timeout(options.recv_timeout)?;

        for (kind, size) in [
            (BufferKind::Receive, options.recv_buffer_size),
            (BufferKind::Send, options.send_buffer_size),
        ] {
            if let Some(size) = size {
                // The kernel clamps or refuses oversized requests; the socket still works.
                if let Err(err) = sockopt::set_buffer_size(&socket, kind, size) {
                    warn!(
                        addr = %local_addr,
                        option = kind.option_name(),
                        size,
                        error = %err,
                        "socket buffer request refused"
                    );
                }
            }
        }

        Ok(Self {
            socket,
            local_addr,
            peer_addr,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Destination of `send`, if this is a connected channel.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Change the receive timeout.
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Borrow the underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        if self.peer_addr.is_none() {
            return Err(TransportError::Io(std::io::Error::new(
                ErrorKind::NotConnected,
                "udp channel has no destination; create it with UdpChannel::connect",
            )));
        }
        loop {
            match self.socket.send(datagram) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}
