//! Datagram and stream transport abstraction.
//!
//! Provides the channels the fragmentation layer runs on:
//! - [`DatagramChannel`], the unreliable MTU-bounded datagram seam
//! - [`UdpChannel`], the UDP implementation with receive timeouts and buffer sizing
//! - [`MemoryChannel`], an in-process channel pair for deterministic tests
//! - [`StreamListener`], TCP bind/accept/connect for the length-prefixed baseline
//!
//! This is the lowest layer of shardgram. Everything else builds on top of
//! the types provided here.

pub mod error;
pub mod memory;
pub mod sockopt;
pub mod tcp;
pub mod traits;
pub mod udp;

pub use error::{Result, TransportError};
pub use memory::MemoryChannel;
pub use tcp::StreamListener;
pub use traits::DatagramChannel;
pub use udp::{UdpChannel, UdpOptions};
