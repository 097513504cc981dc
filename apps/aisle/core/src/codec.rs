use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder};

/// Marks the end of every frame. Compact JSON never contains a raw newline
/// (string contents are escaped), so the terminator cannot occur inside a
/// payload.
pub const TERMINATOR: &[u8] = b"\n\n";
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("no data received within {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    Closed,
    #[error("connection closed with {0} unterminated bytes buffered")]
    Truncated(usize),
    #[error("frame exceeds {limit} bytes without a terminator")]
    TooLarge { limit: usize },
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid frame payload: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FramingError {
    /// A parse failure leaves the stream positioned at the next frame, so the
    /// connection can keep going. Everything else means the transport is gone.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FramingError::Parse(_))
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            FramingError::Timeout(_) => "timeout",
            FramingError::Closed => "closed",
            FramingError::Truncated(_) => "truncated",
            FramingError::TooLarge { .. } => "too_large",
            FramingError::Io(_) => "io",
            FramingError::Parse(_) => "parse",
        }
    }
}

/// Serializes `value` as compact JSON followed by the terminator.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FramingError> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.extend_from_slice(TERMINATOR);
    Ok(bytes)
}

/// Parses one frame body (terminator already stripped).
pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, FramingError> {
    Ok(serde_json::from_slice(frame)?)
}

/// `tokio_util` codec for terminator-delimited JSON frames.
///
/// Decoding yields the raw frame body so the caller can answer a payload it
/// cannot parse without tearing the stream down. Encoding accepts anything
/// serializable.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_bytes: usize,
    /// Bytes of the current buffer already searched for a terminator.
    scanned: usize,
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            scanned: 0,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, FramingError> {
        // Back up one byte so a terminator split across reads is still found.
        let start = self
            .scanned
            .saturating_sub(TERMINATOR.len() - 1)
            .min(src.len());
        let found = src[start..]
            .windows(TERMINATOR.len())
            .position(|window| window == TERMINATOR);

        match found {
            Some(offset) => {
                let frame = src.split_to(start + offset);
                src.advance(TERMINATOR.len());
                self.scanned = 0;
                Ok(Some(frame))
            }
            None if src.len() > self.max_frame_bytes => Err(FramingError::TooLarge {
                limit: self.max_frame_bytes,
            }),
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, FramingError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FramingError::Truncated(src.len())),
        }
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec {
    type Error = FramingError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), FramingError> {
        let bytes = encode(&item)?;
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

/// Waits for the next frame body. `wait` bounds the whole frame, not each
/// read; `None` waits indefinitely. End of stream is [`FramingError::Closed`].
pub async fn recv_frame<S>(frames: &mut S, wait: Option<Duration>) -> Result<BytesMut, FramingError>
where
    S: Stream<Item = Result<BytesMut, FramingError>> + Unpin,
{
    let next = match wait {
        Some(limit) => timeout(limit, frames.next())
            .await
            .map_err(|_| FramingError::Timeout(limit))?,
        None => frames.next().await,
    };
    next.unwrap_or(Err(FramingError::Closed))
}

/// [`recv_frame`] followed by [`decode`].
pub async fn recv_message<S, T>(frames: &mut S, wait: Option<Duration>) -> Result<T, FramingError>
where
    S: Stream<Item = Result<BytesMut, FramingError>> + Unpin,
    T: DeserializeOwned,
{
    let frame = recv_frame(frames, wait).await?;
    decode(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CategoryNode, CategoryRef, Listing, Location, ProductItem, Request, Response};
    use futures_util::SinkExt;
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test_timeout::timeout]
    fn encode_appends_terminator() {
        let bytes = encode(&Request::root()).unwrap();
        assert_eq!(bytes, b"{\"url\":null}\n\n");
    }

    #[test_timeout::timeout]
    fn embedded_newlines_are_escaped() {
        let item = ProductItem::new("Kettle", "p/kettle", "20")
            .with_description("line one\n\nline two");
        let response = Response::ok(
            CategoryRef::node("Kitchen", Location::from("kitchen")),
            Listing::Products(vec![item]),
        );
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(&response, &mut buf).unwrap();
        let body = &buf[..buf.len() - TERMINATOR.len()];
        assert!(!body.windows(2).any(|w| w == TERMINATOR));

        let frame = codec.decode(&mut buf).unwrap().expect("complete frame");
        let decoded: Response = decode(&frame).unwrap();
        assert_eq!(decoded, response);
        assert!(buf.is_empty());
    }

    #[test_timeout::timeout]
    fn frame_split_across_reads() {
        let bytes = encode(&Request::at(Location::from("books"))).unwrap();
        let (head, tail) = bytes.split_at(bytes.len() - 1);

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(head);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(tail);
        let frame = codec.decode(&mut buf).unwrap().expect("frame after tail");
        let request: Request = decode(&frame).unwrap();
        assert_eq!(request.location, Some(Location::from("books")));
        assert!(buf.is_empty());
    }

    #[test_timeout::timeout]
    fn leftover_bytes_stay_buffered() {
        let mut bytes = encode(&Request::root()).unwrap();
        bytes.extend(encode(&Request::at(Location::from("a"))).unwrap());

        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&bytes[..]);
        let first: Request = decode(&codec.decode(&mut buf).unwrap().unwrap()).unwrap();
        let second: Request = decode(&codec.decode(&mut buf).unwrap().unwrap()).unwrap();
        assert_eq!(first, Request::root());
        assert_eq!(second, Request::at(Location::from("a")));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test_timeout::timeout]
    fn oversized_frame_is_refused() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"{\"url\":\"a-very-long-location\""[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FramingError::TooLarge { limit: 8 })
        ));
    }

    #[test_timeout::timeout]
    fn unterminated_tail_at_eof_is_truncated() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"{\"url\":"[..]);
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(FramingError::Truncated(7))
        ));
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }

    #[test_timeout::timeout]
    fn invalid_json_is_a_parse_error() {
        let err = decode::<Request>(b"not json").unwrap_err();
        assert!(matches!(err, FramingError::Parse(_)));
        assert!(err.is_recoverable());
    }

    #[test_timeout::tokio_timeout_test(5)]
    async fn framed_round_trips_a_response() {
        let (client, server) = tokio::io::duplex(64);
        let response = Response::ok(
            CategoryRef::root(),
            Listing::Categories(vec![CategoryNode::new("Books", "books")]),
        );
        let mut sink = FramedWrite::new(client, FrameCodec::default());
        sink.send(&response).await.unwrap();

        let mut frames = FramedRead::new(server, FrameCodec::default());
        let decoded: Response = recv_message(&mut frames, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(decoded, response);
    }

    #[test_timeout::tokio_timeout_test(5)]
    async fn recv_times_out_without_data() {
        let (_client, server) = tokio::io::duplex(64);
        let mut frames = FramedRead::new(server, FrameCodec::default());
        let err = recv_frame(&mut frames, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, FramingError::Timeout(_)));
    }

    #[test_timeout::tokio_timeout_test(5)]
    async fn wait_covers_the_whole_frame() {
        let (mut client, server) = tokio::io::duplex(64);
        tokio::spawn(async move {
            for _ in 0..20 {
                if client.write_all(b" ").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let mut frames = FramedRead::new(server, FrameCodec::default());
        let err = recv_frame(&mut frames, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, FramingError::Timeout(_)));
    }

    #[test_timeout::tokio_timeout_test(5)]
    async fn recv_reports_truncated_frame() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"{\"url\":").await.unwrap();
        drop(client);

        let mut frames = FramedRead::new(server, FrameCodec::default());
        let err = recv_frame(&mut frames, None).await.unwrap_err();
        assert!(matches!(err, FramingError::Truncated(7)));
    }

    #[test_timeout::tokio_timeout_test(5)]
    async fn recv_reports_clean_close() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let mut frames = FramedRead::new(server, FrameCodec::default());
        let err = recv_frame(&mut frames, None).await.unwrap_err();
        assert!(matches!(err, FramingError::Closed));
        assert!(!err.is_recoverable());
    }
}
