//! Fragment framing for MTU-bounded datagrams, plus the length-prefixed
//! stream baseline.
//!
//! Every datagram carries a 16-byte little-endian header:
//! - a 4-byte session tag
//! - a 2-byte fragment sequence and a 2-byte fragment count
//! - an 8-byte message identifier shared by all fragments of one message
//!
//! [`Fragmenter`] splits messages into such datagrams and [`FragmentSender`]
//! pushes them through a [`DatagramChannel`](shardgram_transport::DatagramChannel).
//! Reassembly lives in `shardgram-reassembly`.
//!
//! The stream side ([`StreamReader`], [`StreamWriter`]) frames whole messages
//! with an 8-byte `{session_id, data_len}` header over an ordered byte stream.

pub mod codec;
pub mod config;
pub mod error;
pub mod fragmenter;
pub mod reader;
pub mod sender;
pub mod stream;
pub mod writer;

pub use codec::{
    decode_fragment, encode_fragment, validate_mtu, Fragment, FragmentHeader, DEFAULT_MTU,
    DEFAULT_SESSION_ID, HEADER_SIZE, MAX_FRAGMENTS, MAX_MTU, MIN_MTU,
};
pub use config::{FragmentConfig, StreamConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use error::{FrameError, Result, SendError};
pub use fragmenter::{FragmentBatch, Fragmenter, Fragments, FIRST_MESSAGE_ID};
pub use reader::StreamReader;
pub use sender::FragmentSender;
pub use stream::{
    decode_stream_header, encode_stream_frame, StreamFrame, StreamHeader,
    DEFAULT_MAX_STREAM_PAYLOAD, STREAM_HEADER_SIZE,
};
pub use writer::StreamWriter;
