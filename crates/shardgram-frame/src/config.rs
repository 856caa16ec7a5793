use std::time::Duration;

use crate::codec::{validate_mtu, DEFAULT_MTU, DEFAULT_SESSION_ID, HEADER_SIZE, MAX_FRAGMENTS};
use crate::error::Result;
use crate::stream::DEFAULT_MAX_STREAM_PAYLOAD;

/// Default stall budget for the stream reader.
pub const DEFAULT_MAX_RETRIES: u32 = 30;

/// Default pause between stalled stream reads.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_micros(50);

/// Sender-side fragmentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentConfig {
    /// Transmission unit in bytes, header included. Default: 1024.
    pub mtu: usize,
    /// Session tag stamped on every fragment. Default: 1234.
    pub session_id: u32,
}

impl FragmentConfig {
    /// Reject an MTU outside the supported range.
    pub fn validate(&self) -> Result<()> {
        validate_mtu(self.mtu)
    }

    /// Largest payload slice carried by one fragment.
    pub fn max_fragment_payload(&self) -> usize {
        self.mtu.saturating_sub(HEADER_SIZE)
    }

    /// Largest message that fits in [`MAX_FRAGMENTS`] fragments.
    pub fn max_message_size(&self) -> usize {
        self.max_fragment_payload() * MAX_FRAGMENTS
    }
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            session_id: DEFAULT_SESSION_ID,
        }
    }
}

/// Configuration for the length-prefixed stream reader and writer.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Session tag written into every frame header. Default: 1234.
    pub session_id: u32,
    /// Maximum payload size in bytes. Default: 64 MiB.
    pub max_payload_size: usize,
    /// Consecutive reads without progress tolerated mid-frame. Default: 30.
    pub max_retries: u32,
    /// Sleep between reads without progress. Default: 50µs.
    pub retry_delay: Duration,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID,
            max_payload_size: DEFAULT_MAX_STREAM_PAYLOAD,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
