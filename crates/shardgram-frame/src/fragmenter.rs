use std::iter::FusedIterator;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::codec::{encode_fragment, FragmentHeader, HEADER_SIZE, MAX_FRAGMENTS};
use crate::config::FragmentConfig;
use crate::error::{FrameError, Result};

/// First identifier handed out by a new [`Fragmenter`].
pub const FIRST_MESSAGE_ID: u64 = 1;

/// Splits messages into MTU-sized fragments.
///
/// Message identifiers come from an atomic counter, so one `Fragmenter` may be
/// shared by concurrent senders and every message still gets a distinct id.
#[derive(Debug)]
pub struct Fragmenter {
    config: FragmentConfig,
    next_message_id: AtomicU64,
}

impl Fragmenter {
    /// Create a fragmenter whose first message id is 1.
    pub fn new(config: FragmentConfig) -> Result<Self> {
        Self::with_first_id(config, FIRST_MESSAGE_ID)
    }

    /// Create a fragmenter whose first message id is `first_id`.
    pub fn with_first_id(config: FragmentConfig, first_id: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            next_message_id: AtomicU64::new(first_id),
        })
    }

    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Largest payload slice carried by one fragment.
    pub fn max_fragment_payload(&self) -> usize {
        self.config.max_fragment_payload()
    }

    /// Largest message this fragmenter accepts.
    pub fn max_message_size(&self) -> usize {
        self.config.max_message_size()
    }

    /// Number of fragments needed for a `len`-byte message.
    ///
    /// An empty message still occupies one (empty) fragment.
    pub fn fragment_count(&self, len: usize) -> Result<u16> {
        let max = self.max_message_size();
        if len > max {
            return Err(FrameError::MessageTooLarge { size: len, max });
        }
        let count = len.div_ceil(self.max_fragment_payload()).max(1);
        debug_assert!(count <= MAX_FRAGMENTS);
        Ok(count as u16)
    }

    /// Allocate the next message id.
    pub fn next_message_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Lazily fragment `payload` under a freshly allocated message id.
    ///
    /// The size check runs first, so a rejected message consumes no id.
    pub fn fragments<'a>(&self, payload: &'a [u8]) -> Result<Fragments<'a>> {
        let total = self.fragment_count(payload.len())?;
        let message_id = self.next_message_id();
        trace!(message_id, total, len = payload.len(), "fragmenting message");
        Ok(Fragments {
            payload,
            session_id: self.config.session_id,
            message_id,
            chunk: self.max_fragment_payload(),
            total,
            next: 0,
        })
    }

    /// Fragment `payload` into an owned batch of encoded datagrams.
    pub fn fragment(&self, payload: &[u8]) -> Result<FragmentBatch> {
        let fragments = self.fragments(payload)?;
        let message_id = fragments.message_id();
        let total_fragments = fragments.total_fragments();
        Ok(FragmentBatch {
            message_id,
            total_fragments,
            datagrams: fragments.collect(),
        })
    }
}

/// Iterator over the encoded datagrams of one message.
///
/// Each item is a separately allocated buffer; the source payload is only read.
#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    payload: &'a [u8],
    session_id: u32,
    message_id: u64,
    chunk: usize,
    total: u16,
    next: u16,
}

impl Fragments<'_> {
    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    pub fn total_fragments(&self) -> u16 {
        self.total
    }
}

impl Iterator for Fragments<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.next >= self.total {
            return None;
        }
        let sequence = self.next;
        self.next += 1;

        let start = (sequence as usize * self.chunk).min(self.payload.len());
        let end = (start + self.chunk).min(self.payload.len());
        let slice = &self.payload[start..end];

        let header = FragmentHeader {
            session_id: self.session_id,
            sequence_in_message: sequence,
            total_fragments: self.total,
            message_id: self.message_id,
        };
        let mut dst = BytesMut::with_capacity(HEADER_SIZE + slice.len());
        encode_fragment(&header, slice, &mut dst);
        Some(dst.freeze())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fragments<'_> {}

impl FusedIterator for Fragments<'_> {}

/// All datagrams of one fragmented message.
#[derive(Debug, Clone)]
pub struct FragmentBatch {
    pub message_id: u64,
    pub total_fragments: u16,
    pub datagrams: Vec<Bytes>,
}

impl FragmentBatch {
    pub fn len(&self) -> usize {
        self.datagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datagrams.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bytes> {
        self.datagrams.iter()
    }
}

impl IntoIterator for FragmentBatch {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.datagrams.into_iter()
    }
}
