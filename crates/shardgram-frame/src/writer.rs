use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;

use crate::config::StreamConfig;
use crate::error::{FrameError, Result};
use crate::stream::{encode_stream_frame, StreamFrame};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete length-prefixed frames to any `Write` stream.
pub struct StreamWriter<T> {
    inner: T,
    buf: BytesMut,
    config: StreamConfig,
}

impl<T: Write> StreamWriter<T> {
    /// Create a new stream writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, StreamConfig::default())
    }

    /// Create a new stream writer with explicit configuration.
    pub fn with_config(inner: T, config: StreamConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame, keeping its own session tag.
    pub fn write_frame(&mut self, frame: &StreamFrame) -> Result<()> {
        self.send_tagged(frame.session_id, frame.payload.as_ref())
    }

    /// Frame and send a payload under the configured session tag.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.send_tagged(self.config.session_id, payload)
    }

    fn send_tagged(&mut self, session_id: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_stream_frame(session_id, payload, &mut self.buf)?;

        let mut offset = 0usize;
        let mut attempts = 0u32;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    offset += n;
                    attempts = 0;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) => {
                    attempts = self.stalled(attempts, offset, self.buf.len())?;
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    ///
    /// A flush that keeps timing out is bounded by the same retry budget as writes.
    pub fn flush(&mut self) -> Result<()> {
        let mut attempts = 0u32;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) => {
                    attempts = self.stalled(attempts, 0, 0)?;
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Count one write that made no progress, sleeping before the next try.
    fn stalled(&self, attempts: u32, sent: usize, expected: usize) -> Result<u32> {
        let attempts = attempts + 1;
        if attempts >= self.config.max_retries {
            return Err(FrameError::RetriesExhausted {
                received: sent,
                expected,
                attempts,
            });
        }
        std::thread::sleep(self.config.retry_delay);
        Ok(attempts)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current stream writer configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

fn is_stall(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

impl StreamWriter<TcpStream> {
    /// Create a stream writer for a TCP connection and apply the write timeout from config.
    pub fn with_config_tcp(inner: TcpStream, config: StreamConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::reader::StreamReader;
    use crate::stream::{decode_stream_header, STREAM_HEADER_SIZE};

    fn decode_all(wire: Vec<u8>) -> Vec<StreamFrame> {
        let mut reader = StreamReader::new(Cursor::new(wire));
        let mut frames = Vec::new();
        while let Ok(frame) = reader.read_frame() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn write_single_frame() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"hello").unwrap();

        let wire = writer.into_inner().into_inner();
        let header: [u8; STREAM_HEADER_SIZE] = wire[..STREAM_HEADER_SIZE].try_into().unwrap();
        let header = decode_stream_header(&header);
        assert_eq!(header.session_id, 1234);
        assert_eq!(header.data_len, 5);
        assert_eq!(&wire[STREAM_HEADER_SIZE..], b"hello");
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(b"one").unwrap();
        writer.send(b"two").unwrap();
        writer.send(b"three").unwrap();

        let frames = decode_all(writer.into_inner().into_inner());
        let payloads: Vec<&[u8]> = frames.iter().map(|f| f.payload.as_ref()).collect();
        assert_eq!(
            payloads,
            vec![b"one".as_slice(), b"two".as_slice(), b"three".as_slice()]
        );
    }

    #[test]
    fn configured_session_tag_is_written() {
        let cfg = StreamConfig {
            session_id: 99,
            ..StreamConfig::default()
        };
        let mut writer = StreamWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        writer.send(b"tag").unwrap();

        let frames = decode_all(writer.into_inner().into_inner());
        assert_eq!(frames[0].session_id, 99);
    }

    #[test]
    fn write_frame_keeps_frame_session() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&StreamFrame::new(7, "abc")).unwrap();

        let frames = decode_all(writer.into_inner().into_inner());
        assert_eq!(frames[0].session_id, 7);
        assert_eq!(frames[0].payload.as_ref(), b"abc");
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = StreamConfig {
            max_payload_size: 4,
            ..StreamConfig::default()
        };
        let mut writer = StreamWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn empty_payload_rejected() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(b"").unwrap_err();
        assert!(matches!(err, FrameError::EmptyPayload));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = StreamWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block_writes() {
        let mut writer = StreamWriter::new(FlakyWriter {
            errors: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            data: Vec::new(),
        });
        writer.send(b"retry").unwrap();

        let frames = decode_all(writer.into_inner().data);
        assert_eq!(frames[0].payload.as_ref(), b"retry");
    }

    fn tight_retries(max_retries: u32) -> StreamConfig {
        StreamConfig {
            max_retries,
            retry_delay: std::time::Duration::from_micros(1),
            ..StreamConfig::default()
        }
    }

    #[test]
    fn stalled_write_exhausts_retries() {
        let mut writer = StreamWriter::with_config(
            StallingWriter {
                write_error: Some(ErrorKind::WouldBlock),
                flush_error: None,
            },
            tight_retries(3),
        );

        let err = writer.send(b"stalled").unwrap_err();
        assert!(matches!(
            err,
            FrameError::RetriesExhausted {
                received: 0,
                expected: 15,
                attempts: 3
            }
        ));
    }

    #[test]
    fn timed_out_flush_exhausts_retries() {
        let mut writer = StreamWriter::with_config(
            StallingWriter {
                write_error: None,
                flush_error: Some(ErrorKind::TimedOut),
            },
            tight_retries(2),
        );

        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(
            err,
            FrameError::RetriesExhausted { attempts: 2, .. }
        ));
    }

    #[test]
    fn progress_resets_write_retry_budget() {
        let mut writer = StreamWriter::with_config(
            TrickleWriter {
                stall_next: true,
                data: Vec::new(),
            },
            tight_retries(2),
        );
        writer.send(b"trickle").unwrap();

        let frames = decode_all(writer.into_inner().data);
        assert_eq!(frames[0].payload.as_ref(), b"trickle");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = StreamWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn applies_write_timeout_for_tcp_stream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        let _server = listener.accept().unwrap();

        let cfg = StreamConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..StreamConfig::default()
        };
        let writer = StreamWriter::with_config_tcp(stream, cfg).unwrap();
        assert_eq!(
            writer.get_ref().write_timeout().unwrap(),
            Some(std::time::Duration::from_millis(10))
        );
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyWriter {
        errors: Vec<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.errors.pop() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct StallingWriter {
        write_error: Option<ErrorKind>,
        flush_error: Option<ErrorKind>,
    }

    impl Write for StallingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match self.write_error {
                Some(kind) => Err(std::io::Error::from(kind)),
                None => Ok(buf.len()),
            }
        }

        fn flush(&mut self) -> std::io::Result<()> {
            match self.flush_error {
                Some(kind) => Err(std::io::Error::from(kind)),
                None => Ok(()),
            }
        }
    }

    /// Accepts one byte per write, with a would-block between each.
    struct TrickleWriter {
        stall_next: bool,
        data: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.stall_next {
                self.stall_next = false;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            self.stall_next = true;
            self.data.push(buf[0]);
            Ok(1)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
