use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;

use crate::market_data::venue_book::{BookSide, PriceLevel, Side, VenueBookSnapshot};

/// Cross-venue view rebuilt from scratch on every merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedBook {
    pub bids: BookSide,
    pub asks: BookSide,
}

impl Default for ConsolidatedBook {
    fn default() -> Self {
        Self { bids: BookSide::new(Side::Bid), asks: BookSide::new(Side::Ask) }
    }
}

impl ConsolidatedBook {
    /// Sum quantities at identical (already quantized) prices across venues.
    pub fn merge(snapshots: &[VenueBookSnapshot]) -> Self {
        let mut book = Self::default();
        for snap in snapshots {
            for lvl in snap.bids.levels() {
                book.bids.add(lvl.price, lvl.quantity);
            }
            for lvl in snap.asks.levels() {
                book.asks.add(lvl.price, lvl.quantity);
            }
        }
        book
    }

    /// Top `depth` levels per side, best first, stamped with `timestamp_ms`.
    pub fn to_update(&self, depth: usize, timestamp_ms: i64) -> BookUpdateMessage {
        let update = BookUpdateMessage {
            timestamp_ms,
            bids: self.bids.top(depth),
            asks: self.asks.top(depth),
        };
        debug_assert!(update.is_well_formed(depth), "merge produced an inconsistent book");
        update
    }
}

/// One consolidated update, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookUpdateMessage {
    pub timestamp_ms: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl BookUpdateMessage {
    /// Bounded depth, positive quantities, bids strictly descending and asks
    /// strictly ascending.
    pub fn is_well_formed(&self, depth: usize) -> bool {
        let positive = |levels: &[PriceLevel]| levels.iter().all(|l| l.quantity > Decimal::ZERO);
        self.bids.len() <= depth
            && self.asks.len() <= depth
            && positive(&self.bids)
            && positive(&self.asks)
            && self.bids.windows(2).all(|w| w[0].price > w[1].price)
            && self.asks.windows(2).all(|w| w[0].price < w[1].price)
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
