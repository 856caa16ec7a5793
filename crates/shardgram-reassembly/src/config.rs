use std::time::Duration;

use shardgram_frame::{validate_mtu, DEFAULT_MTU};

use crate::error::{ReassemblyError, Result};

/// Default number of groups tracked at once.
pub const DEFAULT_WINDOW: usize = 64;

/// Default and maximum ingestion worker count.
pub const MAX_WORKERS: usize = 8;

/// Default receive timeout for sockets opened by the receiver.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause after an empty receive.
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_micros(50);

/// Receiver pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Waiting window: maximum live groups after each eviction check. Default: 64.
    pub window: usize,
    /// Ingestion worker threads, `1..=8`. Default: 8.
    pub workers: usize,
    /// Largest datagram accepted, header included. Default: 1024.
    pub mtu: usize,
    /// Socket receive timeout when the receiver opens its own socket. Default: 1s.
    pub recv_timeout: Duration,
    /// Base pause after an empty receive; worker `n` waits `n` µs longer. Default: 50µs.
    pub idle_backoff: Duration,
    /// Drop fragments whose session tag differs. Default: accept all.
    pub session_filter: Option<u32>,
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ReassemblyError::InvalidConfig(
                "window must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ReassemblyError::InvalidConfig(format!(
                "workers must be within 1..={MAX_WORKERS}, got {}",
                self.workers
            )));
        }
        if self.recv_timeout.is_zero() {
            return Err(ReassemblyError::InvalidConfig(
                "recv_timeout must be non-zero".to_string(),
            ));
        }
        validate_mtu(self.mtu)?;
        Ok(())
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            workers: MAX_WORKERS,
            mtu: DEFAULT_MTU,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            session_filter: None,
        }
    }
}
