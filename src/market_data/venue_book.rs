use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::market_data::adapters::{BookMutation, LevelUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// A level as the venue sent it: its own price, the tick that price was
/// quantized onto, and the quantity resting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLevel {
    pub raw_price: Decimal,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl WireLevel {
    pub fn level(&self) -> PriceLevel {
        PriceLevel::new(self.price, self.quantity)
    }
}

/// A level that was already on the grid.
impl From<PriceLevel> for WireLevel {
    fn from(lvl: PriceLevel) -> Self {
        Self { raw_price: lvl.price, price: lvl.price, quantity: lvl.quantity }
    }
}

/// One side of a book: price -> aggregate quantity. Iteration through
/// `levels` is always best-first (bids descending, asks ascending), and no
/// stored quantity is ever <= 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<Decimal, Decimal>,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self { side, levels: BTreeMap::new() }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }

    pub fn get(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Accumulate `quantity` onto `price`. Non-positive quantities are skipped.
    pub fn add(&mut self, price: Decimal, quantity: Decimal) {
        if quantity > Decimal::ZERO {
            let total = self.levels.entry(price).or_insert(Decimal::ZERO);
            *total = total.saturating_add(quantity);
        }
    }

    /// Take `quantity` back off `price`, dropping the level once nothing is left.
    pub fn remove(&mut self, price: Decimal, quantity: Decimal) {
        if let Some(total) = self.levels.get_mut(&price) {
            *total = total.saturating_sub(quantity);
            if *total <= Decimal::ZERO {
                self.levels.remove(&price);
            }
        }
    }

    pub fn levels(&self) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let to_level = |(p, q): (&Decimal, &Decimal)| PriceLevel::new(*p, *q);
        match self.side {
            Side::Bid => Box::new(self.levels.iter().rev().map(to_level)),
            Side::Ask => Box::new(self.levels.iter().map(to_level)),
        }
    }

    pub fn best(&self) -> Option<PriceLevel> {
        self.levels().next()
    }

    pub fn top(&self, n: usize) -> Vec<PriceLevel> {
        self.levels().take(n).collect()
    }
}

// venue price -> (tick it landed on, quantity the venue reported)
type Contributions = BTreeMap<Decimal, (Decimal, Decimal)>;

/// Per-venue local book. Owned by exactly one connector, which mutates it
/// under the `SharedVenueBook` lock; everyone else reads via `snapshot`.
///
/// Several venue prices can share one tick, so each venue price's
/// contribution is remembered and a delta replaces only that share of the
/// tick's total.
#[derive(Debug, Clone)]
pub struct VenueBook {
    pub venue: &'static str,
    pub tick_size: Decimal,
    pub bids: BookSide,
    pub asks: BookSide,
    raw_bids: Contributions,
    raw_asks: Contributions,
}

pub type SharedVenueBook = Arc<Mutex<VenueBook>>;

impl VenueBook {
    pub fn new(venue: &'static str, tick_size: Decimal) -> Self {
        Self {
            venue,
            tick_size,
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            raw_bids: Contributions::new(),
            raw_asks: Contributions::new(),
        }
    }

    pub fn shared(venue: &'static str, tick_size: Decimal) -> SharedVenueBook {
        Arc::new(Mutex::new(Self::new(venue, tick_size)))
    }

    /// Replace both sides with a fresh top-N snapshot. Raw levels that were
    /// quantized onto the same tick are summed.
    pub fn apply_snapshot(&mut self, update: &LevelUpdate) {
        self.bids.clear();
        self.asks.clear();
        self.raw_bids.clear();
        self.raw_asks.clear();
        self.apply_delta(update);
    }

    /// Set or delete only the venue prices named in the delta.
    pub fn apply_delta(&mut self, update: &LevelUpdate) {
        for lvl in &update.bids {
            set_level(&mut self.bids, &mut self.raw_bids, lvl);
        }
        for lvl in &update.asks {
            set_level(&mut self.asks, &mut self.raw_asks, lvl);
        }
    }

    /// Apply a parsed mutation; returns whether the book was touched.
    pub fn apply(&mut self, mutation: &BookMutation) -> bool {
        match mutation {
            BookMutation::Replace(update) => {
                self.apply_snapshot(update);
                true
            }
            BookMutation::Delta(update) => {
                self.apply_delta(update);
                true
            }
            BookMutation::Heartbeat | BookMutation::Acknowledged(_) | BookMutation::Ignored => false,
        }
    }

    pub fn snapshot(&self) -> VenueBookSnapshot {
        VenueBookSnapshot { venue: self.venue, bids: self.bids.clone(), asks: self.asks.clone() }
    }

    pub fn bbo(&self) -> (Option<PriceLevel>, Option<PriceLevel>) {
        (self.bids.best(), self.asks.best())
    }
}

// Swap a venue price's old contribution to its tick for the new one.
// Quantity <= 0 deletes; deleting an absent price is a no-op.
fn set_level(side: &mut BookSide, raw: &mut Contributions, lvl: &WireLevel) {
    if let Some((tick, quantity)) = raw.remove(&lvl.raw_price) {
        side.remove(tick, quantity);
    }
    if lvl.quantity > Decimal::ZERO {
        raw.insert(lvl.raw_price, (lvl.price, lvl.quantity));
        side.add(lvl.price, lvl.quantity);
    }
}

/// Point-in-time copy of a venue book, taken under the venue lock and
/// released before any merge work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueBookSnapshot {
    pub venue: &'static str,
    pub bids: BookSide,
    pub asks: BookSide,
}
