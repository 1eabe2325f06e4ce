use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::market_data::unified_book::{now_millis, BookUpdateMessage, ConsolidatedBook};
use crate::market_data::venue_book::SharedVenueBook;
use crate::publish::Publisher;
use crate::telemetry;

/// Notified by a connector after it has mutated its venue book.
pub trait BookListener: Send + Sync {
    fn on_venue_book_changed(&self, venue: &'static str);
}

/// Rebuilds the consolidated book from every venue on each change and
/// hands the result to the publisher.
pub struct Aggregator {
    venues: Vec<SharedVenueBook>,
    consolidated: Mutex<ConsolidatedBook>,
    publisher: Arc<Publisher>,
    depth: usize,
}

impl Aggregator {
    pub fn new(venues: Vec<SharedVenueBook>, publisher: Arc<Publisher>, depth: usize) -> Self {
        Self { venues, consolidated: Mutex::new(ConsolidatedBook::default()), publisher, depth }
    }

    /// Merge and broadcast. The consolidated lock is held through the
    /// broadcast so subscribers see updates in merge order.
    pub fn recompute(&self) -> BookUpdateMessage {
        let mut consolidated = self.consolidated.lock();
        // one venue lock at a time; never nested under another venue's
        let snapshots: Vec<_> = self.venues.iter().map(|book| book.lock().snapshot()).collect();
        *consolidated = ConsolidatedBook::merge(&snapshots);
        let update = consolidated.to_update(self.depth, now_millis());
        metrics::counter!(telemetry::MERGES_TOTAL).increment(1);
        let delivered = self.publisher.broadcast(&update);
        trace!(bids = update.bids.len(), asks = update.asks.len(), delivered, "consolidated book published");
        update
    }
}

impl BookListener for Aggregator {
    fn on_venue_book_changed(&self, venue: &'static str) {
        trace!(venue, "venue book changed");
        self.recompute();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::adapters::{BookMutation, LevelUpdate};
    use crate::market_data::venue_book::{PriceLevel, VenueBook};
    use crate::publish::proto;
    use crate::publish::Subscriber;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<proto::BookUpdate>>);

    impl Subscriber for Recorder {
        fn send(&self, update: &proto::BookUpdate) -> bool {
            self.0.lock().push(update.clone());
            true
        }
    }

    fn replace(bids: &[(rust_decimal::Decimal, rust_decimal::Decimal)]) -> BookMutation {
        BookMutation::Replace(LevelUpdate::on_grid(bids.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect(), vec![]))
    }

    #[test]
    fn change_on_any_venue_publishes_the_merged_book() {
        let a = VenueBook::shared("a", dec!(0.1));
        let b = VenueBook::shared("b", dec!(0.1));
        let publisher = Arc::new(Publisher::new());
        let recorder = Arc::new(Recorder::default());
        publisher.subscribe(recorder.clone());
        let aggregator = Aggregator::new(vec![a.clone(), b.clone()], publisher, 100);

        a.lock().apply(&replace(&[(dec!(100.0), dec!(1))]));
        aggregator.on_venue_book_changed("a");
        b.lock().apply(&replace(&[(dec!(100.0), dec!(2)), (dec!(99.9), dec!(4))]));
        aggregator.on_venue_book_changed("b");

        let seen = recorder.0.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].bids.len(), 1);
        assert_eq!(seen[1].bids[0].price, 100.0);
        assert_eq!(seen[1].bids[0].quantity, 3.0);
        assert_eq!(seen[1].bids[1].quantity, 4.0);
        assert!(seen[1].timestamp_ms >= seen[0].timestamp_ms);
    }

    #[test]
    fn depth_limits_published_levels() {
        let a = VenueBook::shared("a", dec!(1));
        let levels: Vec<_> = (0..10).map(|i| (rust_decimal::Decimal::from(100 - i), dec!(1))).collect();
        a.lock().apply(&replace(&levels));
        let aggregator = Aggregator::new(vec![a], Arc::new(Publisher::new()), 3);

        let update = aggregator.recompute();
        assert_eq!(update.bids.len(), 3);
        assert_eq!(update.bids[0].price, dec!(100));
        assert_eq!(update.bids[2].price, dec!(98));
    }
}
