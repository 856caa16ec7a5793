use std::io::{ErrorKind, Read};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::trace;

use crate::config::StreamConfig;
use crate::error::{FrameError, Result};
use crate::stream::{decode_stream_header, StreamFrame, STREAM_HEADER_SIZE};

/// Reads complete length-prefixed frames from any `Read` stream.
///
/// Partial reads are accumulated internally. A read that makes no progress
/// (timeout or would-block) mid-frame counts against
/// [`StreamConfig::max_retries`]; any progress resets the budget.
pub struct StreamReader<T> {
    inner: T,
    config: StreamConfig,
}

impl<T: Read> StreamReader<T> {
    /// Create a new stream reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, StreamConfig::default())
    }

    /// Create a new stream reader with explicit configuration.
    pub fn with_config(inner: T, config: StreamConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A
    /// timeout before the first header byte is returned as an idle
    /// [`FrameError::Io`] (see [`FrameError::is_idle`]).
    pub fn read_frame(&mut self) -> Result<StreamFrame> {
        let mut header = [0u8; STREAM_HEADER_SIZE];
        self.fill(&mut header, true)?;
        let header = decode_stream_header(&header);
        let len = header.validate(self.config.max_payload_size)?;

        let mut payload = BytesMut::zeroed(len);
        self.fill(&mut payload, false)?;
        trace!(session_id = header.session_id, len, "stream frame read");

        Ok(StreamFrame {
            session_id: header.session_id,
            payload: payload.freeze(),
        })
    }

    fn fill(&mut self, buf: &mut [u8], idle_ok: bool) -> Result<()> {
        let mut filled = 0usize;
        let mut attempts = 0u32;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    filled += n;
                    attempts = 0;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    if idle_ok && filled == 0 {
                        return Err(FrameError::Io(err));
                    }
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        return Err(FrameError::RetriesExhausted {
                            received: filled,
                            expected: buf.len(),
                            attempts,
                        });
                    }
                    std::thread::sleep(self.config.retry_delay);
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current stream reader configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl StreamReader<TcpStream> {
    /// Create a stream reader for a TCP connection and apply the read timeout from config.
    pub fn with_config_tcp(inner: TcpStream, config: StreamConfig) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
