use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::market_data::unified_book::BookUpdateMessage;
use crate::market_data::venue_book::PriceLevel;
use crate::publish::proto;
use crate::telemetry;

pub type SubscriberId = u64;

/// Anything that can take a consolidated update. `send` must never block;
/// returning false marks the subscriber dead.
pub trait Subscriber: Send + Sync {
    fn send(&self, update: &proto::BookUpdate) -> bool;
}

/// Subscriber backed by a bounded queue drained by the gRPC response stream.
/// A full queue means the client fell too far behind and it is dropped.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<Result<proto::BookUpdate, tonic::Status>>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<Result<proto::BookUpdate, tonic::Status>>) -> Self {
        Self { tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn send(&self, update: &proto::BookUpdate) -> bool {
        self.tx.try_send(Ok(update.clone())).is_ok()
    }
}

/// Live subscriber set with non-blocking fan-out.
#[derive(Default)]
pub struct Publisher {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriberId, Arc<dyn Subscriber>)>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.lock();
        subs.push((id, subscriber));
        metrics::gauge!(telemetry::SUBSCRIBERS).set(subs.len() as f64);
        info!(subscriber = id, total = subs.len(), "subscriber registered");
        id
    }

    /// Remove by identity. Returns false if it was already pruned.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        let removed = subs.len() != before;
        metrics::gauge!(telemetry::SUBSCRIBERS).set(subs.len() as f64);
        if removed {
            info!(subscriber = id, total = subs.len(), "subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send to every subscriber, pruning any whose send fails in the same
    /// pass. Returns the number of successful deliveries.
    pub fn broadcast(&self, update: &BookUpdateMessage) -> usize {
        let wire = to_wire(update);
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(id, sub)| {
            let alive = sub.send(&wire);
            if !alive {
                debug!(subscriber = *id, "send failed, dropping subscriber");
            }
            alive
        });
        let dropped = before - subs.len();
        if dropped > 0 {
            metrics::counter!(telemetry::SUBSCRIBERS_DROPPED_TOTAL).increment(dropped as u64);
            metrics::gauge!(telemetry::SUBSCRIBERS).set(subs.len() as f64);
            info!(dropped, total = subs.len(), "pruned dead subscribers");
        }
        subs.len()
    }
}

pub fn to_wire(update: &BookUpdateMessage) -> proto::BookUpdate {
    let level = |l: &PriceLevel| proto::PriceLevel {
        price: l.price.to_f64().unwrap_or_default(),
        quantity: l.quantity.to_f64().unwrap_or_default(),
    };
    proto::BookUpdate {
        timestamp_ms: update.timestamp_ms,
        bids: update.bids.iter().map(level).collect(),
        asks: update.asks.iter().map(level).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Default)]
    struct CountingSubscriber {
        attempts: AtomicUsize,
        failing: AtomicBool,
    }

    impl Subscriber for CountingSubscriber {
        fn send(&self, _update: &proto::BookUpdate) -> bool {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            !self.failing.load(Ordering::SeqCst)
        }
    }

    fn update() -> BookUpdateMessage {
        BookUpdateMessage {
            timestamp_ms: 42,
            bids: vec![PriceLevel::new(dec!(100.0), dec!(3))],
            asks: vec![PriceLevel::new(dec!(100.1), dec!(1.5))],
        }
    }

    #[test]
    fn broadcast_reaches_every_live_subscriber() {
        let publisher = Publisher::new();
        let a = Arc::new(CountingSubscriber::default());
        let b = Arc::new(CountingSubscriber::default());
        publisher.subscribe(a.clone());
        publisher.subscribe(b.clone());

        assert_eq!(publisher.broadcast(&update()), 2);
        assert_eq!(a.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(b.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_subscriber_is_pruned_and_never_retried() {
        let publisher = Publisher::new();
        let dead = Arc::new(CountingSubscriber::default());
        let live = Arc::new(CountingSubscriber::default());
        dead.failing.store(true, Ordering::SeqCst);
        publisher.subscribe(dead.clone());
        publisher.subscribe(live.clone());

        publisher.broadcast(&update());
        publisher.broadcast(&update());

        assert_eq!(dead.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(live.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(publisher.len(), 1);
    }

    #[test]
    fn unsubscribe_by_identity() {
        let publisher = Publisher::new();
        let a = publisher.subscribe(Arc::new(CountingSubscriber::default()));
        let b = publisher.subscribe(Arc::new(CountingSubscriber::default()));
        assert!(publisher.unsubscribe(a));
        assert!(!publisher.unsubscribe(a));
        assert_eq!(publisher.len(), 1);
        assert!(publisher.unsubscribe(b));
        assert!(publisher.is_empty());
    }

    #[test]
    fn full_channel_counts_as_dead() {
        let publisher = Publisher::new();
        let (tx, mut rx) = mpsc::channel(1);
        publisher.subscribe(Arc::new(ChannelSubscriber::new(tx)));

        assert_eq!(publisher.broadcast(&update()), 1);
        // queue of one is now full; the next update drops the slow client
        assert_eq!(publisher.broadcast(&update()), 0);

        let received = rx.try_recv().unwrap().unwrap();
        assert_eq!(received.timestamp_ms, 42);
        assert_eq!(received.bids[0].price, 100.0);
        assert_eq!(received.asks[0].quantity, 1.5);
    }

    #[test]
    fn closed_channel_counts_as_dead() {
        let publisher = Publisher::new();
        let (tx, rx) = mpsc::channel(4);
        publisher.subscribe(Arc::new(ChannelSubscriber::new(tx)));
        drop(rx);
        assert_eq!(publisher.broadcast(&update()), 0);
        assert!(publisher.is_empty());
    }
}
