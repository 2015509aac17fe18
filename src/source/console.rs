//! Interactive console source
//!
//! Stand-in for the card reader during testing: prints a prompt, reads one
//! line and publishes it as a frame.

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

use crate::error::SourceError;
use crate::registry::{Frame, MAX_FRAME_SIZE};

use super::EventSource;

/// Default console prompt
pub const DEFAULT_PROMPT: &str = ">>";

/// Line-based source reading "card swipes" typed on a console
pub struct ConsoleSource<R, W> {
    reader: R,
    writer: W,
    prompt: String,
}

impl ConsoleSource<BufReader<Stdin>, Stdout> {
    /// Console source on the process's stdin/stdout
    pub fn stdio(prompt: impl Into<String>) -> Self {
        Self::new(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            prompt,
        )
    }
}

impl<R, W> ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, prompt: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            prompt: prompt.into(),
        }
    }

    async fn show_prompt(&mut self) -> std::io::Result<()> {
        self.writer.write_all(self.prompt.as_bytes()).await?;
        self.writer.write_all(b" ").await?;
        self.writer.flush().await
    }
}

impl<R, W> EventSource for ConsoleSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read(&mut self) -> Result<Frame, SourceError> {
        if let Err(e) = self.show_prompt().await {
            tracing::debug!(error = %e, "Failed to write prompt");
        }

        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(SourceError::Closed);
        }

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        if line.len() > MAX_FRAME_SIZE {
            tracing::warn!(
                len = line.len(),
                max = MAX_FRAME_SIZE,
                "Console line too long, truncating"
            );
        }

        Ok(Frame::new(line))
    }
}
