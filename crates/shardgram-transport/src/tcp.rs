use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// TCP transport for the length-prefixed stream protocol.
///
/// Provides bind/accept/connect over TCP. The stream protocol needs nothing
/// beyond an ordered, reliable byte stream, so accepted connections are
/// handed out as plain [`TcpStream`]s.
#[derive(Debug)]
pub struct StreamListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl StreamListener {
    /// Bind and listen on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<TcpStream> {
        let result = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        let stream = result.map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to tcp socket");
        Ok(stream)
    }

    /// Switch the listener between blocking and polling accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;

    #[test]
    fn bind_accept_connect() {
        let listener = StreamListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr();

        let handle = std::thread::spawn(move || {
            let mut client = StreamListener::connect(addr, Some(Duration::from_secs(2))).unwrap();
            client.write_all(b"hello").unwrap();
        });

        let (mut server, _peer) = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_address() {
        let addr = {
            let listener = StreamListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
            listener.local_addr()
        };

        let err = StreamListener::connect(addr, Some(Duration::from_millis(200))).unwrap_err();
        match err {
            TransportError::Connect { addr: reported, .. } => {
                assert_eq!(reported, addr.to_string())
            }
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[test]
    fn nonblocking_accept_would_block() {
        let listener = StreamListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        listener.set_nonblocking(true).unwrap();

        let err = listener.accept().unwrap_err();
        assert!(matches!(
            err,
            TransportError::Accept(e) if e.kind() == std::io::ErrorKind::WouldBlock
        ));
    }
}
