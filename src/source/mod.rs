//! Event sources
//!
//! An event source is the single producer feeding the broadcaster. Each
//! successful read yields one frame; an error is permanent and stops the
//! publish loop.
//!
//! - [`SerialSource`]: reads raw frames from a port (or any byte stream)
//! - [`ConsoleSource`]: prompts on a console and turns each line into a frame
//! - [`ChannelSource`]: in-process source fed through a channel

pub mod console;
pub mod serial;

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::SourceError;
use crate::registry::Frame;

pub use console::ConsoleSource;
pub use serial::SerialSource;

/// Producer of frames
pub trait EventSource: Send {
    /// Wait for the next frame
    ///
    /// An error means the source is gone for good; it is never retried.
    fn read(&mut self) -> impl Future<Output = Result<Frame, SourceError>> + Send;
}

/// Source fed by an in-process channel
///
/// Dropping every [`mpsc::Sender`] behaves like a device disconnect.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Frame>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(capacity: usize) -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }
}

impl EventSource for ChannelSource {
    async fn read(&mut self) -> Result<Frame, SourceError> {
        self.rx.recv().await.ok_or(SourceError::Closed)
    }
}
