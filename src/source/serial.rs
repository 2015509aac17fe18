//! Serial port source
//!
//! Reads frames from a card reader attached to a port. The bytes returned
//! by one read call make up one frame; a zero-length read means the device
//! went away.

use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::SourceError;
use crate::registry::{Frame, MAX_FRAME_SIZE};

use super::EventSource;

/// Source reading raw frames from a byte stream
pub struct SerialSource<R = File> {
    reader: R,
}

impl SerialSource<File> {
    /// Open the port at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).await?;

        tracing::info!(port = %path.display(), "Serial port opened");

        Ok(Self::from_reader(file))
    }
}

impl<R> SerialSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap an already open byte stream
    pub fn from_reader(reader: R) -> Self {
        Self { reader }
    }
}

impl<R> EventSource for SerialSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self) -> Result<Frame, SourceError> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let n = self.reader.read(&mut buf).await?;

        if n == 0 {
            return Err(SourceError::Closed);
        }

        Ok(Frame::new(Bytes::copy_from_slice(&buf[..n])))
    }
}
