//! Raw byte-copy sink
//!
//! Writes each frame's bytes to the peer exactly as read off the source,
//! with no framing.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::SendError;
use crate::registry::Frame;

use super::FrameSink;

/// Sink copying frame bytes verbatim
pub struct RawSink<W> {
    writer: W,
}

impl<W> RawSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W> FrameSink for RawSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
