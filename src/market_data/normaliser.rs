// Convert wire strings into decimal levels on a venue's tick grid.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{ParseError, ParseResult};
use crate::market_data::venue_book::{Side, WireLevel};

/// Snap `raw_price` onto the `tick_size` grid, rounding toward the book
/// interior: bids floor (toward zero), asks ceil unless already on a tick.
/// A non-positive tick size disables quantization.
///
/// Returns `None` when the result does not fit in a `Decimal`.
pub fn quantize(raw_price: Decimal, tick_size: Decimal, is_bid: bool) -> Option<Decimal> {
    if tick_size <= Decimal::ZERO {
        return Some(raw_price);
    }
    let floor = raw_price.checked_div(tick_size)?.trunc().checked_mul(tick_size)?;
    if is_bid {
        Some(floor)
    } else if raw_price > floor {
        floor.checked_add(tick_size)
    } else {
        Some(raw_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normaliser {
    pub tick_size: Decimal,
}

impl Normaliser {
    pub fn new(tick_size: Decimal) -> Self {
        Self { tick_size }
    }

    pub fn price(&self, side: Side, raw: &str) -> ParseResult<Decimal> {
        self.on_grid(side, raw).map(|(_, tick)| tick)
    }

    /// Parse `raw` and return it together with its tick.
    fn on_grid(&self, side: Side, raw: &str) -> ParseResult<(Decimal, Decimal)> {
        let price = parse_decimal("price", raw)?;
        let tick = quantize(price, self.tick_size, side == Side::Bid)
            .ok_or_else(|| ParseError::InvalidNumber { field: "price", value: raw.to_string() })?;
        Ok((price, tick))
    }

    pub fn quantity(&self, raw: &str) -> ParseResult<Decimal> {
        parse_decimal("quantity", raw)
    }

    /// Normalise one `[price, quantity, ...]` wire level. Extra trailing
    /// fields (order counts, liquidation flags) are ignored.
    pub fn level(&self, side: Side, raw: &[String]) -> ParseResult<WireLevel> {
        match raw {
            [price, quantity, ..] => {
                let (raw_price, price) = self.on_grid(side, price)?;
                Ok(WireLevel { raw_price, price, quantity: self.quantity(quantity)? })
            }
            _ => Err(ParseError::MalformedLevel(raw.len())),
        }
    }

    pub fn side(&self, side: Side, raw: &[Vec<String>]) -> ParseResult<Vec<WireLevel>> {
        raw.iter().map(|lvl| self.level(side, lvl)).collect()
    }
}

fn parse_decimal(field: &'static str, raw: &str) -> ParseResult<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| ParseError::InvalidNumber { field, value: raw.to_string() })
}
