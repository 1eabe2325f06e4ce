// Binance partial-depth adapter: every book frame is a complete top-20 snapshot.

use rust_decimal::Decimal;
use serde_json::json;

use super::binance_types::BinanceFrame;
use super::{is_heartbeat_reply, BookMutation, Endpoint, Instrument, LevelUpdate, VenueAdapter};
use crate::error::{ParseError, ParseResult};
use crate::market_data::normaliser::Normaliser;
use crate::market_data::venue_book::Side;

pub struct BinanceAdapter {
    pub stream: String, // e.g. "btcusdt@depth20@100ms"
    pub normaliser: Normaliser,
}

impl BinanceAdapter {
    pub const VENUE: &'static str = "binance";

    pub fn new(instrument: &Instrument, tick_size: Decimal) -> Self {
        Self {
            stream: format!("{}@depth20@100ms", instrument.concatenated().to_ascii_lowercase()),
            normaliser: Normaliser::new(tick_size),
        }
    }
}

impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> &'static str {
        Self::VENUE
    }

    fn tick_size(&self) -> Decimal {
        self.normaliser.tick_size
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::secure("stream.binance.com", 9443, "/ws")
    }

    fn subscribe_payload(&self) -> String {
        json!({ "method": "SUBSCRIBE", "params": [self.stream], "id": 1 }).to_string()
    }

    fn parse(&self, frame: &str) -> ParseResult<BookMutation> {
        if is_heartbeat_reply(frame) {
            return Ok(BookMutation::Heartbeat);
        }
        match serde_json::from_str::<BinanceFrame>(frame)? {
            BinanceFrame::Depth(depth) => Ok(BookMutation::Replace(LevelUpdate {
                bids: self.normaliser.side(Side::Bid, &depth.bids)?,
                asks: self.normaliser.side(Side::Ask, &depth.asks)?,
            })),
            BinanceFrame::Reply(reply) => match reply.error {
                Some(err) => Err(ParseError::VenueRejected { code: err.code.to_string(), message: err.msg }),
                None if reply.id.is_some() && reply.result.is_none() => {
                    Ok(BookMutation::Acknowledged(format!("subscribed to {}", self.stream)))
                }
                None => Ok(BookMutation::Ignored),
            },
        }
    }
}
