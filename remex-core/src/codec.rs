//! Length-prefixed frame codec for the agent wire protocol.
//!
//! # Wire Format
//!
//! ```text
//! ┌────────────────┬───────────────────────────────┐
//! │ length: u32 LE │ payload: `length` bytes (JSON) │
//! └────────────────┴───────────────────────────────┘
//! ```
//!
//! The explicit length header gives deterministic message boundaries:
//! a reader always knows exactly how many bytes belong to the current
//! frame, independent of socket timing. Idle-timeout boundary detection
//! would add a fixed latency floor per message and truncate whenever the
//! peer pauses mid-send, so it is not used here.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::AgentError;

/// Size of the length prefix in bytes.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Maximum frame size the codec will accept (64 MiB).
///
/// Base64-encoded file chunks dominate large frames; callers moving more
/// than this in one operation must chunk via the upload/download offset
/// path.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Codec converting a raw byte stream into discrete message frames.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame: MAX_FRAME_SIZE,
        }
    }

    /// Codec with a custom frame-size ceiling (tests, constrained hosts).
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self { max_frame }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl tokio_util::codec::Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = AgentError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        let mut len_bytes = [0u8; LEN_PREFIX_SIZE];
        len_bytes.copy_from_slice(&src[..LEN_PREFIX_SIZE]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        if len > self.max_frame {
            return Err(AgentError::FrameTooLarge {
                size: len,
                max: self.max_frame,
            });
        }

        if src.len() < LEN_PREFIX_SIZE + len {
            // Reserve for the rest of the frame so the next read fills it.
            src.reserve(LEN_PREFIX_SIZE + len - src.len());
            return Ok(None);
        }

        src.advance(LEN_PREFIX_SIZE);
        Ok(Some(src.split_to(len)))
    }
}

impl tokio_util::codec::Encoder<Bytes> for FrameCodec {
    type Error = AgentError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_frame {
            return Err(AgentError::FrameTooLarge {
                size: item.len(),
                max: self.max_frame,
            });
        }

        dst.reserve(LEN_PREFIX_SIZE + item.len());
        dst.put_u32_le(item.len() as u32);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn encode_decode_roundtrip() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let payload = Bytes::from_static(b"{\"action\":\"execute\"}");
        codec.encode(payload.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &payload[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_returns_none() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let payload = Bytes::from(vec![0x42u8; 100]);
        codec.encode(payload, &mut buf).unwrap();

        // Feed only the prefix plus half the payload.
        let mut partial = buf.split_to(LEN_PREFIX_SIZE + 50);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Completing the frame yields it.
        partial.extend_from_slice(&buf);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.len(), 100);
    }

    #[test]
    fn empty_frame_roundtrip() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Bytes::new(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn oversize_frame_rejected_on_decode() {
        let mut codec = FrameCodec::with_max_frame(16);
        let mut buf = BytesMut::new();
        buf.put_u32_le(17);
        buf.extend_from_slice(&[0u8; 17]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, AgentError::FrameTooLarge { size: 17, max: 16 }));
    }

    #[test]
    fn oversize_frame_rejected_on_encode() {
        let mut codec = FrameCodec::with_max_frame(16);
        let mut buf = BytesMut::new();
        let err = codec.encode(Bytes::from(vec![0u8; 17]), &mut buf).unwrap_err();
        assert!(matches!(err, AgentError::FrameTooLarge { .. }));
    }

    #[test]
    fn back_to_back_frames() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Bytes::from_static(b"first"), &mut buf).unwrap();
        codec.encode(Bytes::from_static(b"second"), &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"first");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"second");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
