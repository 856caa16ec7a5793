use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Stream frame header: session (4) + length (4) = 8 bytes.
pub const STREAM_HEADER_SIZE: usize = 8;

/// Default maximum stream payload size: 64 MiB.
pub const DEFAULT_MAX_STREAM_PAYLOAD: usize = 64 * 1024 * 1024;

/// Decoded stream frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub session_id: u32,
    pub data_len: u32,
}

impl StreamHeader {
    /// Check the declared length against the configured maximum.
    pub fn validate(&self, max_payload: usize) -> Result<usize> {
        let len = self.data_len as usize;
        if len == 0 {
            return Err(FrameError::EmptyPayload);
        }
        if len > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: max_payload,
            });
        }
        Ok(len)
    }
}

/// One complete message read from a stream.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    pub session_id: u32,
    pub payload: Bytes,
}

impl StreamFrame {
    /// Create a new frame.
    pub fn new(session_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            session_id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        STREAM_HEADER_SIZE + self.payload.len()
    }
}

/// Encode a stream frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────┐
/// │ Session      │ Length    │ Payload          │
/// │ (4B LE)      │ (4B LE)   │ (Length bytes)   │
/// └──────────────┴───────────┴─────────────────┘
/// ```
pub fn encode_stream_frame(session_id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(STREAM_HEADER_SIZE + payload.len());
    dst.put_u32_le(session_id);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a stream frame header.
pub fn decode_stream_header(src: &[u8; STREAM_HEADER_SIZE]) -> StreamHeader {
    let mut cursor = &src[..];
    StreamHeader {
        session_id: cursor.get_u32_le(),
        data_len: cursor.get_u32_le(),
    }
}
