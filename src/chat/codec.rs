//! Raw message codec — one socket read is one message.
//!
//! The wire protocol carries no framing header and no delimiter: whatever
//! a single receive returns is treated as one standalone message, capped
//! at [`MAX_MESSAGE_SIZE`] bytes. Senders split anything longer into
//! consecutive sends. Bytes are UTF-8 by convention; invalid sequences
//! are decoded lossily rather than rejected.

use std::io;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_MESSAGE_SIZE;

/// Codec for the unframed chat protocol.
#[derive(Debug, Default)]
pub struct RawCodec;

impl Decoder for RawCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        // Drain everything that has arrived, up to one message's worth.
        // Anything beyond the cap stays buffered and becomes the next
        // message, mirroring what a bounded recv would have returned.
        let take = src.len().min(MAX_MESSAGE_SIZE);
        let chunk = src.split_to(take);

        Ok(Some(String::from_utf8_lossy(&chunk).into_owned()))
    }
}

impl Encoder<Arc<String>> for RawCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Arc<String>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Truncate oversized payloads at a char boundary; properly split
        // messages never hit this.
        let mut len = item.len().min(MAX_MESSAGE_SIZE);
        while !item.is_char_boundary(len) {
            len -= 1;
        }

        dst.reserve(len);
        dst.put_slice(&item.as_bytes()[..len]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Decoder ──────────────────────────────────────────────────

    #[test]
    fn decode_empty_buffer() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_takes_whole_read_as_one_message() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::from("hello there friends");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg, "hello there friends");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_caps_at_max_message_size() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::from(vec![b'x'; MAX_MESSAGE_SIZE + 10].as_slice());

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.len(), MAX_MESSAGE_SIZE);

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.len(), 10);

        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_utf8_is_lossy() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::from(&[b'h', b'i', 0xff][..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg, "hi\u{fffd}");
    }

    // ── Encoder ──────────────────────────────────────────────────

    #[test]
    fn encode_writes_bytes_verbatim() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::new();
        codec.encode(Arc::new("pong".to_owned()), &mut buf).unwrap();
        assert_eq!(&buf[..], b"pong");
    }

    #[test]
    fn encode_truncates_oversized_message() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::new();
        let big = "y".repeat(MAX_MESSAGE_SIZE + 100);
        codec.encode(Arc::new(big), &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn encode_truncation_respects_char_boundaries() {
        let mut codec = RawCodec;
        let mut buf = BytesMut::new();
        // 'é' is two bytes; one of them straddles the cap.
        let awkward = format!("{}é", "a".repeat(MAX_MESSAGE_SIZE - 1));
        codec.encode(Arc::new(awkward), &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_MESSAGE_SIZE - 1);
        assert!(std::str::from_utf8(&buf).is_ok());
    }
}
