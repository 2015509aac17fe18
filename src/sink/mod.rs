//! Frame sinks
//!
//! A frame sink turns a subscription's frames into bytes for one network
//! peer. Both transports share the same adapter loop
//! ([`pump_subscription`]); they only differ in how a frame is written.
//!
//! - [`RawSink`]: frame bytes written verbatim
//! - [`StreamSink`]: frame wrapped in a framed `CardEvent` message

pub mod raw;
pub mod stream;

use std::future::Future;

use crate::error::SendError;
use crate::registry::{Broadcaster, Frame, Subscription};

pub use raw::RawSink;
pub use stream::StreamSink;

/// Writes frames to one peer
pub trait FrameSink: Send {
    /// Write one frame to the peer
    fn send(&mut self, frame: &Frame) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Forward frames from `subscription` to `sink` until the stream ends
///
/// End-of-stream (eviction, broadcaster shutdown) is a normal return. A
/// failed send unsubscribes and returns the error.
pub async fn pump_subscription<K: FrameSink>(
    broadcaster: &Broadcaster,
    mut subscription: Subscription,
    sink: &mut K,
) -> Result<(), SendError> {
    let id = subscription.id();

    while let Some(frame) = subscription.recv().await {
        if let Err(e) = sink.send(&frame).await {
            tracing::debug!(subscriber = %id, error = %e, "Send failed, unsubscribing");
            broadcaster.unsubscribe(id);
            return Err(e);
        }
    }

    tracing::debug!(
        subscriber = %id,
        state = ?subscription.state(),
        "Subscription ended"
    );
    broadcaster.unsubscribe(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::registry::SubscriberState;

    /// Records frames, failing after `fail_after` sends
    struct RecordingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
        fail_after: Option<usize>,
    }

    impl FrameSink for RecordingSink {
        async fn send(&mut self, frame: &Frame) -> Result<(), SendError> {
            let mut frames = self.frames.lock().unwrap();
            if Some(frames.len()) == self.fail_after {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone").into());
            }
            frames.push(frame.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pump_forwards_until_shutdown() {
        let broadcaster = Broadcaster::new();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let subscription = broadcaster.subscribe();

        let task = {
            let broadcaster = broadcaster.clone();
            let mut sink = RecordingSink {
                frames: Arc::clone(&frames),
                fail_after: None,
            };
            tokio::spawn(async move {
                pump_subscription(&broadcaster, subscription, &mut sink).await
            })
        };

        let (tx, source) = crate::source::ChannelSource::new(1);
        let run = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.run(source).await })
        };

        tx.send(Frame::from_static(b"A")).await.unwrap();
        tx.send(Frame::from_static(b"B")).await.unwrap();
        drop(tx);

        assert!(run.await.unwrap().is_err());
        assert!(task.await.unwrap().is_ok());
        assert_eq!(
            *frames.lock().unwrap(),
            vec![Frame::from_static(b"A"), Frame::from_static(b"B")]
        );
    }

    #[tokio::test]
    async fn test_pump_unsubscribes_on_send_failure() {
        let broadcaster = Broadcaster::new();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let subscription = broadcaster.subscribe();
        let mut other = broadcaster.subscribe();

        let task = {
            let broadcaster = broadcaster.clone();
            let mut sink = RecordingSink {
                frames: Arc::clone(&frames),
                fail_after: Some(0),
            };
            tokio::spawn(async move {
                pump_subscription(&broadcaster, subscription, &mut sink).await
            })
        };

        let (tx, source) = crate::source::ChannelSource::new(1);
        let run = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.run(source).await })
        };

        tx.send(Frame::from_static(b"A")).await.unwrap();

        assert!(matches!(task.await.unwrap(), Err(SendError::Io(_))));
        assert_eq!(other.recv().await.unwrap().as_bytes(), b"A");

        tx.send(Frame::from_static(b"B")).await.unwrap();
        assert_eq!(other.recv().await.unwrap().as_bytes(), b"B");
        assert_eq!(other.state(), SubscriberState::Active);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.stats().evictions, 0);
        run.abort();
    }
}
