//! Length-prefixed framing for the master server TCP stream.
//!
//! Each frame is a little-endian `i32` length followed by that many payload
//! bytes. The master server does not reassemble partial packets, so the
//! encoder places prefix and payload in one contiguous region of the write
//! buffer and `Framed` hands them to the socket together.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Size of the length prefix in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Default upper bound for a single frame payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let declared = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if declared <= 0 || declared as usize > self.max_frame_len {
            return Err(ProtocolError::InvalidFrameLength(i64::from(declared)));
        }

        let len = declared as usize;
        if src.len() < FRAME_HEADER_LEN + len {
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(len)))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_frame_len {
            return Err(ProtocolError::InvalidFrameLength(payload.len() as i64));
        }

        dst.reserve(FRAME_HEADER_LEN + payload.len());
        dst.put_i32_le(payload.len() as i32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_places_prefix_before_payload() {
        let mut codec = FrameCodec::default();
        let mut dst = BytesMut::new();
        codec
            .encode(Bytes::from_static(&[0xAA, 0xBB, 0xCC]), &mut dst)
            .unwrap();
        assert_eq!(dst.as_ref(), &[3, 0, 0, 0, 0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = FrameCodec::default();
        let mut src = BytesMut::from(&[5u8, 0, 0][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(&[0, 1, 2]);
        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(&[3, 4, 5, 9]);
        let frame = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(frame.as_ref(), &[1, 2, 3, 4, 5]);
        assert_eq!(src.as_ref(), &[9]);
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        let mut codec = FrameCodec::new(16);

        let mut zero = BytesMut::from(&[0u8, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut zero),
            Err(ProtocolError::InvalidFrameLength(0))
        ));

        let mut negative = BytesMut::from(&(-4i32).to_le_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut negative),
            Err(ProtocolError::InvalidFrameLength(-4))
        ));

        let mut oversized = BytesMut::from(&17i32.to_le_bytes()[..]);
        assert!(matches!(
            codec.decode(&mut oversized),
            Err(ProtocolError::InvalidFrameLength(17))
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut codec = FrameCodec::new(2);
        let mut dst = BytesMut::new();
        assert!(codec
            .encode(Bytes::from_static(&[1, 2, 3]), &mut dst)
            .is_err());
        assert!(dst.is_empty());
    }
}
