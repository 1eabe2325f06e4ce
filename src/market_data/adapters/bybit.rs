// Bybit orderbook.50 adapter: snapshot on subscribe, incremental deltas after.
//
// The socket is shared by every topic we might subscribe to, so pushes are
// filtered on the exact topic before they touch the book.

use rust_decimal::Decimal;
use serde_json::json;

use super::bybit_types::BybitFrame;
use super::{is_heartbeat_reply, BookMutation, Endpoint, Instrument, LevelUpdate, VenueAdapter};
use crate::error::{ParseError, ParseResult};
use crate::market_data::normaliser::Normaliser;
use crate::market_data::venue_book::Side;

pub struct BybitAdapter {
    pub topic: String, // e.g. "orderbook.50.BTCUSDT"
    pub normaliser: Normaliser,
}

impl BybitAdapter {
    pub const VENUE: &'static str = "bybit";

    pub fn new(instrument: &Instrument, tick_size: Decimal) -> Self {
        Self { topic: format!("orderbook.50.{}", instrument.concatenated()), normaliser: Normaliser::new(tick_size) }
    }
}

impl VenueAdapter for BybitAdapter {
    fn venue(&self) -> &'static str {
        Self::VENUE
    }

    fn tick_size(&self) -> Decimal {
        self.normaliser.tick_size
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::secure("stream.bybit.com", 443, "/v5/public/spot")
    }

    fn subscribe_payload(&self) -> String {
        json!({ "op": "subscribe", "args": [self.topic] }).to_string()
    }

    fn heartbeat(&self) -> Option<String> {
        Some(json!({ "op": "ping" }).to_string())
    }

    fn parse(&self, frame: &str) -> ParseResult<BookMutation> {
        if is_heartbeat_reply(frame) {
            return Ok(BookMutation::Heartbeat);
        }
        let frame: BybitFrame = serde_json::from_str(frame)?;

        match frame.success {
            Some(true) => return Ok(BookMutation::Acknowledged(format!("subscribed to {}", self.topic))),
            Some(false) => {
                return Err(ParseError::VenueRejected {
                    code: frame.op.unwrap_or_default(),
                    message: frame.ret_msg.unwrap_or_default(),
                })
            }
            None => {}
        }
        if frame.topic.as_deref() != Some(self.topic.as_str()) {
            return Ok(BookMutation::Ignored);
        }
        let Some(book) = frame.data else {
            return Ok(BookMutation::Ignored);
        };
        let update = LevelUpdate {
            bids: self.normaliser.side(Side::Bid, &book.b)?,
            asks: self.normaliser.side(Side::Ask, &book.a)?,
        };
        match frame.kind.as_deref() {
            Some("snapshot") => Ok(BookMutation::Replace(update)),
            Some("delta") => Ok(BookMutation::Delta(update)),
            _ => Ok(BookMutation::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::venue_book::{PriceLevel, VenueBook};
    use rust_decimal_macros::dec;

    fn adapter() -> BybitAdapter {
        BybitAdapter::new(&Instrument::new("BTC", "USDT"), dec!(0.1))
    }

    const SNAPSHOT: &str = r#"{"topic":"orderbook.50.BTCUSDT","ts":1672304484978,"type":"snapshot","data":{"s":"BTCUSDT","b":[["16493.50","0.006"],["16493.00","0.100"]],"a":[["16611.00","0.029"],["16612.00","0.213"]],"u":18521288,"seq":7961638724},"cts":1672304484976}"#;

    #[test]
    fn snapshot_then_delta() {
        let adapter = adapter();
        let mut book = VenueBook::new("bybit", dec!(0.1));
        assert!(book.apply(&adapter.parse(SNAPSHOT).unwrap()));
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks.len(), 2);

        let delta = r#"{"topic":"orderbook.50.BTCUSDT","ts":1672304484979,"type":"delta","data":{"s":"BTCUSDT","b":[["16493.50","0"],["16492.00","1.5"]],"a":[["16611.00","0.5"],["16700.00","0"]],"u":18521289,"seq":7961638725},"cts":1672304484977}"#;
        let mutation = adapter.parse(delta).unwrap();
        assert!(matches!(mutation, BookMutation::Delta(_)));
        assert!(book.apply(&mutation));

        assert_eq!(book.bids.get(dec!(16493.5)), None);
        assert_eq!(book.bids.best(), Some(PriceLevel::new(dec!(16493.0), dec!(0.100))));
        assert_eq!(book.bids.get(dec!(16492.0)), Some(dec!(1.5)));
        assert_eq!(book.asks.get(dec!(16611.0)), Some(dec!(0.5)));
        assert_eq!(book.asks.len(), 2);
    }

    #[test]
    fn delta_on_a_shared_tick_keeps_the_other_venue_price() {
        let adapter = adapter();
        let mut book = VenueBook::new("bybit", dec!(0.1));
        let snapshot = r#"{"topic":"orderbook.50.BTCUSDT","ts":1,"type":"snapshot","data":{"s":"BTCUSDT","b":[["100.07","2"],["100.05","1"]],"a":[],"u":1,"seq":1}}"#;
        assert!(book.apply(&adapter.parse(snapshot).unwrap()));
        assert_eq!(book.bids.get(dec!(100.0)), Some(dec!(3)));

        let delta = r#"{"topic":"orderbook.50.BTCUSDT","ts":2,"type":"delta","data":{"s":"BTCUSDT","b":[["100.07","0"]],"a":[],"u":2,"seq":2}}"#;
        assert!(book.apply(&adapter.parse(delta).unwrap()));
        assert_eq!(book.bids.get(dec!(100.0)), Some(dec!(1)));
        assert_eq!(book.bids.len(), 1);
    }

    #[test]
    fn other_topics_are_filtered() {
        let frame = SNAPSHOT.replace("orderbook.50.BTCUSDT", "orderbook.50.ETHUSDT");
        assert_eq!(adapter().parse(&frame).unwrap(), BookMutation::Ignored);
        let trade = r#"{"topic":"publicTrade.BTCUSDT","type":"snapshot","data":{"b":[],"a":[]}}"#;
        assert_eq!(adapter().parse(trade).unwrap(), BookMutation::Ignored);
    }

    #[test]
    fn operation_replies() {
        let ack = r#"{"success":true,"ret_msg":"subscribe","conn_id":"2324d924","req_id":"","op":"subscribe"}"#;
        assert!(matches!(adapter().parse(ack).unwrap(), BookMutation::Acknowledged(_)));

        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"0970e817","op":"ping"}"#;
        assert_eq!(adapter().parse(pong).unwrap(), BookMutation::Heartbeat);

        let fail = r#"{"success":false,"ret_msg":"error:handler not found","conn_id":"x","op":"subscribe"}"#;
        assert!(matches!(adapter().parse(fail).unwrap_err(), ParseError::VenueRejected { .. }));
    }

    #[test]
    fn heartbeat_is_json_ping() {
        assert_eq!(adapter().heartbeat().as_deref(), Some(r#"{"op":"ping"}"#));
    }
}
