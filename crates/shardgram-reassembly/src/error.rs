use shardgram_frame::FrameError;
use shardgram_transport::TransportError;

/// Errors raised while setting up a receiver.
///
/// Once running, a receiver reports nothing through this type: bad datagrams
/// are dropped and counted, and transport hiccups are logged and retried.
#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    #[error("invalid receiver config: {0}")]
    InvalidConfig(String),

    #[error("invalid receiver config: {0}")]
    Frame(#[from] FrameError),

    #[error("failed to spawn ingestion worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, ReassemblyError>;
