//! Windowed reassembly of fragmented messages.
//!
//! A [`Receiver`] runs a pool of ingestion workers over one
//! [`DatagramChannel`](shardgram_transport::DatagramChannel). Each worker
//! decodes fragments and routes them into a [`GroupTable`], which keeps one
//! [`FragmentGroup`] per message id in ascending id order. The table is bounded
//! by a waiting window: once it holds more groups than the window allows, the
//! oldest are evicted whether complete or not.
//!
//! Readers take the oldest complete message with [`Receiver::read`], optionally
//! discarding older incomplete groups as stale.

pub mod config;
pub mod error;
pub mod group;
mod notify;
pub mod receiver;
pub mod stats;
pub mod table;

pub use config::{
    ReceiverConfig, DEFAULT_IDLE_BACKOFF, DEFAULT_RECV_TIMEOUT, DEFAULT_WINDOW, MAX_WORKERS,
};
pub use error::{ReassemblyError, Result};
pub use group::{EnqueueOutcome, FragmentGroup, ReassembledMessage};
pub use receiver::Receiver;
pub use stats::{ReceiverStats, StatsSnapshot};
pub use table::{Delivery, GroupTable};
