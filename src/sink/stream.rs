//! Streaming-call sink
//!
//! Serves the card event stream: the client sends one empty `CardRequest`,
//! then receives one framed `CardEvent` per frame, with the frame bytes as
//! the card id.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result, SendError};
use crate::protocol::codec::{encode_message, read_message, HEADER_LEN};
use crate::protocol::{CardEvent, CardRequest};
use crate::registry::Frame;

use super::FrameSink;

/// Wait for the client's request that opens the stream
pub async fn accept_request<R>(reader: &mut R) -> Result<CardRequest>
where
    R: AsyncRead + Unpin,
{
    match read_message(reader).await? {
        Some(payload) => Ok(CardRequest::decode(payload)?),
        None => Err(ProtocolError::UnexpectedEof.into()),
    }
}

/// Sink wrapping each frame in a `CardEvent` message
pub struct StreamSink<W> {
    writer: W,
    buf: BytesMut,
}

impl<W> StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: BytesMut::with_capacity(HEADER_LEN + 64),
        }
    }
}

impl<W> FrameSink for StreamSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &Frame) -> std::result::Result<(), SendError> {
        let payload = CardEvent::from_frame(frame).encode_to_bytes();

        self.buf.clear();
        encode_message(&payload, &mut self.buf);

        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_frame_sent_as_card_event() {
        // header + CardEvent { card: { id: "1234" } }
        let expected = [0, 0, 0, 0, 8, 0x0A, 0x06, 0x0A, 0x04, b'1', b'2', b'3', b'4'];
        let mock = Builder::new().write(&expected).build();
        let mut sink = StreamSink::new(mock);

        sink.send(&Frame::from_static(b"1234")).await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_empty_request() {
        let mut reader = &[0u8, 0, 0, 0, 0][..];
        assert_eq!(accept_request(&mut reader).await.unwrap(), CardRequest);
    }

    #[tokio::test]
    async fn test_accept_without_request_fails() {
        let mut reader = &b""[..];
        let result = accept_request(&mut reader).await;
        assert!(matches!(
            result,
            Err(Error::Protocol(ProtocolError::UnexpectedEof))
        ));
    }
}
