//! Fan-out publisher
//!
//! Reads frames from the event source and hands each one to every active
//! subscriber, evicting subscribers that do not keep up.

use std::future::Future;
use std::sync::Arc;

use crate::error::SourceError;
use crate::source::EventSource;
use crate::stats::{BroadcastCounters, BroadcastStats};

use super::config::BroadcastConfig;
use super::entry::{DeliveryOutcome, EvictionReason};
use super::frame::{Frame, SubscriberId};
use super::store::SubscriberRegistry;
use super::subscription::Subscription;

/// Single-producer, multi-subscriber frame distributor
///
/// Cheap to clone; clones share one registry. Exactly one task should drive
/// [`run`](Self::run) or [`run_until`](Self::run_until).
#[derive(Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

struct Shared {
    registry: Arc<SubscriberRegistry>,
    config: BroadcastConfig,
    counters: BroadcastCounters,
}

impl Broadcaster {
    /// Create a broadcaster with the default delivery policy
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    pub fn with_config(config: BroadcastConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Arc::new(SubscriberRegistry::new()),
                config,
                counters: BroadcastCounters::new(),
            }),
        }
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.shared.config
    }

    /// Register a subscriber
    ///
    /// The subscriber receives every frame published after this returns.
    /// Once the publish loop has stopped, the handle starts closed and is
    /// not counted in [`BroadcastStats::total_subscriptions`].
    pub fn subscribe(&self) -> Subscription {
        let (subscription, registered) = self.shared.registry.register();
        if registered {
            self.shared.counters.record_subscription();
        }
        subscription
    }

    /// Remove a subscriber; unknown or already removed ids are ignored
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.registry.unsubscribe(id);
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Snapshot of the broadcaster's counters
    pub fn stats(&self) -> BroadcastStats {
        self.shared
            .counters
            .snapshot(self.shared.registry.len())
    }

    /// Run the publish loop until the source fails
    ///
    /// Always returns the source's error. Every active subscriber is closed
    /// before returning.
    pub async fn run<S: EventSource>(&self, source: S) -> Result<(), SourceError> {
        self.run_until(source, std::future::pending()).await
    }

    /// Run the publish loop until the source fails or `shutdown` completes
    ///
    /// Returns `Ok(())` on shutdown. Either way, every active subscriber is
    /// closed and later subscriptions start closed.
    pub async fn run_until<S, F>(&self, mut source: S, shutdown: F) -> Result<(), SourceError>
    where
        S: EventSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let frame = tokio::select! {
                _ = &mut shutdown => {
                    let closed = self.shared.registry.close_all();
                    tracing::info!(subscribers = closed, "Broadcaster shut down");
                    return Ok(());
                }
                result = source.read() => match result {
                    Ok(frame) => frame,
                    Err(e) => {
                        let closed = self.shared.registry.close_all();
                        tracing::error!(
                            error = %e,
                            subscribers = closed,
                            "Event source failed, broadcaster stopping"
                        );
                        return Err(e);
                    }
                },
            };

            self.publish(frame).await;
        }
    }

    /// Fan one frame out to the current subscribers
    ///
    /// The registry lock is taken twice: once to snapshot, once to evict.
    /// Deliveries run without it, so subscribe/unsubscribe never wait on a
    /// slow subscriber.
    async fn publish(&self, frame: Frame) {
        let registry = &self.shared.registry;
        let timeout = self.shared.config.delivery_timeout;

        let snapshot = registry.snapshot();
        let mut victims = Vec::new();
        let mut delivered = 0u64;

        for entry in &snapshot {
            match entry.deliver(frame.clone(), timeout).await {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::TimedOut => {
                    victims.push((entry.id, EvictionReason::DeliveryTimeout))
                }
                DeliveryOutcome::Gone => victims.push((entry.id, EvictionReason::SubscriberGone)),
                DeliveryOutcome::Inactive => {}
            }
        }

        // Snapshot clones keep queues open; release them before evicting
        drop(snapshot);

        let evicted = if victims.is_empty() {
            Vec::new()
        } else {
            registry.evict(&victims)
        };

        for (id, reason) in &evicted {
            tracing::warn!(
                subscriber = %id,
                reason = %reason,
                timeout_ms = timeout.as_millis() as u64,
                "Subscriber evicted"
            );
        }

        self.shared
            .counters
            .record_published(delivered, evicted.len() as u64);

        tracing::trace!(
            len = frame.len(),
            delivered = delivered,
            evicted = evicted.len(),
            "Frame published"
        );
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("config", &self.shared.config)
            .field("subscribers", &self.shared.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::SubscriberState;
    use crate::source::ChannelSource;

    async fn collect(mut sub: Subscription, n: usize) -> Vec<Frame> {
        let mut frames = Vec::with_capacity(n);
        while frames.len() < n {
            match sub.recv().await {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        frames
    }

    fn spawn_run(
        broadcaster: &Broadcaster,
        source: ChannelSource,
    ) -> tokio::task::JoinHandle<Result<(), SourceError>> {
        let broadcaster = broadcaster.clone();
        tokio::spawn(async move { broadcaster.run(source).await })
    }

    async fn send(tx: &mpsc::Sender<Frame>, data: &'static [u8]) {
        tx.send(Frame::from_static(data)).await.unwrap();
    }

    #[tokio::test]
    async fn test_single_subscriber_receives_frame() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);
        let sub = broadcaster.subscribe();
        let reader = tokio::spawn(collect(sub, 1));
        let run = spawn_run(&broadcaster, source);

        send(&tx, b"1234").await;

        let frames = reader.await.unwrap();
        assert_eq!(frames, vec![Frame::from_static(b"1234")]);
        run.abort();
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_in_order() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);

        let readers: Vec<_> = (0..3)
            .map(|_| tokio::spawn(collect(broadcaster.subscribe(), 2)))
            .collect();
        let run = spawn_run(&broadcaster, source);

        send(&tx, b"A").await;
        send(&tx, b"B").await;

        for reader in readers {
            let frames = reader.await.unwrap();
            assert_eq!(
                frames,
                vec![Frame::from_static(b"A"), Frame::from_static(b"B")]
            );
        }
        run.abort();
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backfill() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);
        let mut early = broadcaster.subscribe();
        let run = spawn_run(&broadcaster, source);

        send(&tx, b"old").await;
        assert_eq!(early.recv().await.unwrap().as_bytes(), b"old");

        let mut late = broadcaster.subscribe();
        send(&tx, b"new").await;

        // Delivery follows subscription order
        assert_eq!(early.recv().await.unwrap().as_bytes(), b"new");
        assert_eq!(late.recv().await.unwrap().as_bytes(), b"new");
        run.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscriber_evicted() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);

        let mut stalled = broadcaster.subscribe();
        let responsive = tokio::spawn(collect(broadcaster.subscribe(), 3));
        let run = spawn_run(&broadcaster, source);

        send(&tx, b"1").await;
        send(&tx, b"2").await;
        send(&tx, b"3").await;

        let frames = responsive.await.unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::from_static(b"1"),
                Frame::from_static(b"2"),
                Frame::from_static(b"3"),
            ]
        );

        // The frame that timed out is never surfaced
        assert!(stalled.recv().await.is_none());
        assert_eq!(stalled.state(), SubscriberState::Evicted);
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.stats().evictions, 1);
        run.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_respects_configured_timeout() {
        let config = BroadcastConfig::default().delivery_timeout(Duration::from_millis(50));
        let broadcaster = Broadcaster::with_config(config);
        let mut stalled = broadcaster.subscribe();

        let started = tokio::time::Instant::now();
        broadcaster.publish(Frame::from_static(b"x")).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(200));
        assert!(stalled.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_delivery_does_not_block_registry() {
        let broadcaster = Broadcaster::new();
        let _stalled = broadcaster.subscribe();

        let publish = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move { broadcaster.publish(Frame::from_static(b"A")).await })
        };

        // Publish is now waiting on the stalled handoff
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!publish.is_finished());

        let joined = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);
        broadcaster.unsubscribe(joined.id());
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(!publish.is_finished());

        publish.await.unwrap();
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(broadcaster.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_source_error_closes_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        let run = spawn_run(&broadcaster, source);

        // Simulated device disconnect
        drop(tx);

        let result = run.await.unwrap();
        assert!(matches!(result, Err(SourceError::Closed)));
        assert!(a.recv().await.is_none());
        assert!(b.recv().await.is_none());
        assert_eq!(a.state(), SubscriberState::Closed);
        assert_eq!(broadcaster.subscriber_count(), 0);

        // Nothing can join a stopped broadcaster
        let mut late = broadcaster.subscribe();
        assert_eq!(late.state(), SubscriberState::Closed);
        assert!(late.recv().await.is_none());
        assert_eq!(broadcaster.stats().total_subscriptions, 2);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let broadcaster = Broadcaster::new();
        let (_tx, source) = ChannelSource::new(1);
        let mut sub = broadcaster.subscribe();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let run = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                broadcaster
                    .run_until(source, async {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        stop_tx.send(()).unwrap();
        assert!(run.await.unwrap().is_ok());
        assert!(sub.recv().await.is_none());
        assert_eq!(sub.state(), SubscriberState::Closed);
    }

    #[tokio::test]
    async fn test_unsubscribed_receives_nothing_further() {
        let broadcaster = Broadcaster::new();
        let (tx, source) = ChannelSource::new(1);
        let mut gone = broadcaster.subscribe();
        let mut stays = broadcaster.subscribe();
        let run = spawn_run(&broadcaster, source);

        broadcaster.unsubscribe(gone.id());
        broadcaster.unsubscribe(gone.id());
        send(&tx, b"after").await;

        assert_eq!(stays.recv().await.unwrap().as_bytes(), b"after");
        assert!(gone.recv().await.is_none());
        assert_eq!(broadcaster.stats().evictions, 0);
        run.abort();
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let dropped = broadcaster.subscribe();
        let mut kept = broadcaster.subscribe();
        drop(dropped);

        let reader = tokio::spawn(async move { kept.recv().await });
        broadcaster.publish(Frame::from_static(b"z")).await;

        assert_eq!(reader.await.unwrap().unwrap().as_bytes(), b"z");
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_stats_track_publishing() {
        let broadcaster = Broadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        let readers = tokio::spawn(async move {
            a.recv().await;
            b.recv().await;
            (a, b)
        });
        broadcaster.publish(Frame::from_static(b"s")).await;
        let _handles = readers.await.unwrap();

        let stats = broadcaster.stats();
        assert_eq!(stats.frames_published, 1);
        assert_eq!(stats.frames_delivered, 2);
        assert_eq!(stats.total_subscriptions, 2);
        assert_eq!(stats.subscriber_count, 2);
    }
}
