use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Fragment header: session (4) + sequence (2) + total (2) + message id (8) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Smallest supported transmission unit.
pub const MIN_MTU: usize = 512;

/// Largest supported transmission unit.
pub const MAX_MTU: usize = 4096;

/// Default transmission unit.
pub const DEFAULT_MTU: usize = 1024;

/// Default session tag stamped on every fragment.
pub const DEFAULT_SESSION_ID: u32 = 1234;

/// Upper bound on fragments per message (the header counts them in a `u16`).
pub const MAX_FRAGMENTS: usize = u16::MAX as usize;

/// Fixed-size header preceding every fragment payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentHeader {
    /// Protocol/application tag, constant for one sender.
    pub session_id: u32,
    /// Zero-based position within the message.
    pub sequence_in_message: u16,
    /// Number of fragments making up the message.
    pub total_fragments: u16,
    /// Identity shared by all fragments of one message.
    pub message_id: u64,
}

impl FragmentHeader {
    /// Whether this header can belong to a completable message.
    pub fn is_consistent(&self) -> bool {
        self.total_fragments != 0 && self.sequence_in_message < self.total_fragments
    }
}

/// A decoded fragment: header plus the payload slice it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub header: FragmentHeader,
    pub payload: Bytes,
}

impl Fragment {
    /// Create a new fragment.
    pub fn new(header: FragmentHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The total wire size of this fragment (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encode into a freshly allocated datagram.
    pub fn to_datagram(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_fragment(&self.header, &self.payload, &mut dst);
        dst.freeze()
    }
}

/// Encode a fragment into the wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌────────────┬──────────┬──────────┬──────────────┬─────────────────┐
/// │ Session    │ Sequence │ Total    │ Message ID   │ Payload         │
/// │ (4B LE)    │ (2B LE)  │ (2B LE)  │ (8B LE)      │ (rest of dgram) │
/// └────────────┴──────────┴──────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_fragment(header: &FragmentHeader, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32_le(header.session_id);
    dst.put_u16_le(header.sequence_in_message);
    dst.put_u16_le(header.total_fragments);
    dst.put_u64_le(header.message_id);
    dst.put_slice(payload);
}

/// Decode one datagram into a fragment.
///
/// The payload is a zero-copy slice of `datagram`.
pub fn decode_fragment(mut datagram: Bytes) -> Result<Fragment> {
    if datagram.len() < HEADER_SIZE {
        return Err(FrameError::MalformedFragment {
            len: datagram.len(),
            min: HEADER_SIZE,
        });
    }

    let header = FragmentHeader {
        session_id: datagram.get_u32_le(),
        sequence_in_message: datagram.get_u16_le(),
        total_fragments: datagram.get_u16_le(),
        message_id: datagram.get_u64_le(),
    };

    if !header.is_consistent() {
        return Err(FrameError::InconsistentFragment {
            sequence: header.sequence_in_message,
            total: header.total_fragments,
        });
    }

    Ok(Fragment {
        header,
        payload: datagram,
    })
}

/// Check that `mtu` lies within the supported range.
pub fn validate_mtu(mtu: usize) -> Result<()> {
    if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
        return Err(FrameError::InvalidMtu {
            mtu,
            min: MIN_MTU,
            max: MAX_MTU,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(sequence: u16, total: u16, message_id: u64) -> FragmentHeader {
        FragmentHeader {
            session_id: DEFAULT_SESSION_ID,
            sequence_in_message: sequence,
            total_fragments: total,
            message_id,
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, shardgram!";
        let hdr = header(1, 3, 42);

        encode_fragment(&hdr, payload, &mut buf);
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let fragment = decode_fragment(buf.freeze()).unwrap();
        assert_eq!(fragment.header, hdr);
        assert_eq!(fragment.payload.as_ref(), payload);
    }

    #[test]
    fn test_wire_layout_is_little_endian() {
        let mut buf = BytesMut::new();
        let hdr = FragmentHeader {
            session_id: 0x0403_0201,
            sequence_in_message: 0x0605,
            total_fragments: 0x0807,
            message_id: 0x100F_0E0D_0C0B_0A09,
        };
        encode_fragment(&hdr, &[0xFF], &mut buf);

        assert_eq!(
            buf.as_ref(),
            &[
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
                0x0E, 0x0F, 0x10, 0xFF
            ]
        );
    }

    #[test]
    fn test_decode_header_only() {
        let mut buf = BytesMut::new();
        encode_fragment(&header(0, 1, 7), &[], &mut buf);

        let fragment = decode_fragment(buf.freeze()).unwrap();
        assert_eq!(fragment.header.message_id, 7);
        assert!(fragment.payload.is_empty());
    }

    #[test]
    fn test_decode_short_datagram() {
        let err = decode_fragment(Bytes::from_static(&[0u8; 15])).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MalformedFragment { len: 15, min: 16 }
        ));

        let err = decode_fragment(Bytes::new()).unwrap_err();
        assert!(matches!(err, FrameError::MalformedFragment { len: 0, .. }));
    }

    #[test]
    fn test_decode_zero_total_rejected() {
        let mut buf = BytesMut::new();
        encode_fragment(&header(0, 0, 1), b"x", &mut buf);

        let err = decode_fragment(buf.freeze()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InconsistentFragment {
                sequence: 0,
                total: 0
            }
        ));
    }

    #[test]
    fn test_decode_sequence_out_of_range_rejected() {
        let mut buf = BytesMut::new();
        encode_fragment(&header(3, 3, 1), b"x", &mut buf);

        let err = decode_fragment(buf.freeze()).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InconsistentFragment {
                sequence: 3,
                total: 3
            }
        ));
    }

    #[test]
    fn test_to_datagram_matches_encode() {
        let fragment = Fragment::new(header(2, 5, 99), &b"abc"[..]);
        let datagram = fragment.to_datagram();

        assert_eq!(datagram.len(), fragment.wire_size());
        assert_eq!(decode_fragment(datagram).unwrap(), fragment);
    }

    #[test]
    fn test_validate_mtu_bounds() {
        assert!(validate_mtu(MIN_MTU).is_ok());
        assert!(validate_mtu(DEFAULT_MTU).is_ok());
        assert!(validate_mtu(MAX_MTU).is_ok());
        assert!(matches!(
            validate_mtu(MIN_MTU - 1),
            Err(FrameError::InvalidMtu { mtu: 511, .. })
        ));
        assert!(matches!(
            validate_mtu(MAX_MTU + 1),
            Err(FrameError::InvalidMtu { mtu: 4097, .. })
        ));
    }
}
