use shardgram_transport::TransportError;

/// Errors that can occur during fragment or stream encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The datagram is shorter than the fragment header.
    #[error("malformed fragment ({len} bytes, header needs {min})")]
    MalformedFragment { len: usize, min: usize },

    /// The header describes a fragment that can never complete a message.
    #[error("inconsistent fragment (sequence {sequence} of {total})")]
    InconsistentFragment { sequence: u16, total: u16 },

    /// The message needs more fragments than the header can count.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The configured transmission unit is outside the supported range.
    #[error("mtu {mtu} outside supported range {min}..={max}")]
    InvalidMtu { mtu: usize, min: usize, max: usize },

    /// A stream frame payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A stream frame declared or carried no payload.
    #[error("empty stream payload")]
    EmptyPayload,

    /// The stream stalled mid-frame for longer than the retry budget.
    #[error("stream stalled after {received} of {expected} bytes ({attempts} attempts)")]
    RetriesExhausted {
        received: usize,
        expected: usize,
        attempts: u32,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether this is a read timeout that arrived between frames.
    ///
    /// [`StreamReader`](crate::StreamReader) reports one when no byte of the
    /// next header arrived in time; the stream is still usable.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            FrameError::Io(err)
                if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors returned by [`FragmentSender::send`](crate::FragmentSender::send).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The message was rejected before any fragment was transmitted.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Transmission stopped at fragment `sent`; fragments `0..sent` are on the wire.
    #[error("send aborted after {sent} of {total} fragments: {source}")]
    Partial {
        sent: u16,
        total: u16,
        #[source]
        source: TransportError,
    },
}
