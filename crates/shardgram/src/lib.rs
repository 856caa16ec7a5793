//! Message-oriented transport over unreliable, MTU-bounded datagram channels.
//!
//! A sender splits each message into fragments that fit one datagram; a pool
//! of receiver workers regroups them by message id and hands back whole
//! messages. Memory on the receiving side is bounded by a waiting window that
//! discards the oldest undelivered messages under load.
//!
//! # Crate Structure
//!
//! - [`transport`]: datagram channel abstraction (UDP, in-memory) and TCP listener
//! - [`frame`]: fragment wire codec, fragmenter, sender, and length-prefixed stream framing
//! - [`reassembly`]: fragment groups, windowed group table, multi-worker receiver
//!   (behind the `reassembly` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use shardgram_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use shardgram_frame::*;
}

/// Re-export reassembly types (requires `reassembly` feature).
#[cfg(feature = "reassembly")]
pub mod reassembly {
    pub use shardgram_reassembly::*;
}
