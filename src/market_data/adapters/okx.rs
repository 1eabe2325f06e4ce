// OKX books5 adapter: each push carries a complete top-5 snapshot in data[0].

use rust_decimal::Decimal;
use serde_json::json;

use super::okx_types::OkxFrame;
use super::{is_heartbeat_reply, BookMutation, Endpoint, Instrument, LevelUpdate, VenueAdapter};
use crate::error::{ParseError, ParseResult};
use crate::market_data::normaliser::Normaliser;
use crate::market_data::venue_book::Side;

pub const CHANNEL: &str = "books5";

pub struct OkxAdapter {
    pub inst_id: String, // e.g. "BTC-USDT"
    pub normaliser: Normaliser,
}

impl OkxAdapter {
    pub const VENUE: &'static str = "okx";

    pub fn new(instrument: &Instrument, tick_size: Decimal) -> Self {
        Self { inst_id: instrument.dashed(), normaliser: Normaliser::new(tick_size) }
    }
}

impl VenueAdapter for OkxAdapter {
    fn venue(&self) -> &'static str {
        Self::VENUE
    }

    fn tick_size(&self) -> Decimal {
        self.normaliser.tick_size
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::secure("ws.okx.com", 8443, "/ws/v5/public")
    }

    fn subscribe_payload(&self) -> String {
        json!({ "op": "subscribe", "args": [{ "channel": CHANNEL, "instId": self.inst_id }] }).to_string()
    }

    fn heartbeat(&self) -> Option<String> {
        Some("ping".to_string())
    }

    fn parse(&self, frame: &str) -> ParseResult<BookMutation> {
        if is_heartbeat_reply(frame) {
            return Ok(BookMutation::Heartbeat);
        }
        let frame: OkxFrame = serde_json::from_str(frame)?;
        match frame.event.as_deref() {
            Some("subscribe") => {
                return Ok(BookMutation::Acknowledged(format!("subscribed to {} {}", CHANNEL, self.inst_id)));
            }
            Some("error") => {
                return Err(ParseError::VenueRejected {
                    code: frame.code.unwrap_or_default(),
                    message: frame.msg.unwrap_or_default(),
                });
            }
            Some(_) => return Ok(BookMutation::Ignored),
            None => {}
        }
        let Some(book) = frame.data.first() else {
            return Ok(BookMutation::Ignored);
        };
        Ok(BookMutation::Replace(LevelUpdate {
            bids: self.normaliser.side(Side::Bid, &book.bids)?,
            asks: self.normaliser.side(Side::Ask, &book.asks)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::venue_book::WireLevel;
    use rust_decimal_macros::dec;

    fn adapter() -> OkxAdapter {
        OkxAdapter::new(&Instrument::new("BTC", "USDT"), dec!(0.1))
    }

    #[test]
    fn subscribe_payload_and_heartbeat() {
        let payload: serde_json::Value = serde_json::from_str(&adapter().subscribe_payload()).unwrap();
        assert_eq!(payload["args"][0]["channel"], "books5");
        assert_eq!(payload["args"][0]["instId"], "BTC-USDT");
        assert_eq!(adapter().heartbeat().as_deref(), Some("ping"));
    }

    #[test]
    fn books5_push_is_full_replace() {
        let frame = r#"{"arg":{"channel":"books5","instId":"BTC-USDT"},"data":[{"asks":[["8476.98","415","0","13"],["8477","7","0","2"]],"bids":[["8476.97","256","0","12"]],"instId":"BTC-USDT","ts":"1597026383085","seqId":123}]}"#;
        let mutation = adapter().parse(frame).unwrap();
        let wire = |raw_price, price, quantity| WireLevel { raw_price, price, quantity };
        assert_eq!(
            mutation,
            BookMutation::Replace(LevelUpdate {
                bids: vec![wire(dec!(8476.97), dec!(8476.9), dec!(256))],
                asks: vec![wire(dec!(8476.98), dec!(8477.0), dec!(415)), wire(dec!(8477), dec!(8477), dec!(7))],
            })
        );
    }

    #[test]
    fn control_events() {
        let ack = r#"{"event":"subscribe","arg":{"channel":"books5","instId":"BTC-USDT"},"connId":"a4d3ae55"}"#;
        assert!(matches!(adapter().parse(ack).unwrap(), BookMutation::Acknowledged(_)));

        let err = r#"{"event":"error","code":"60012","msg":"Invalid request","connId":"a4d3ae55"}"#;
        match adapter().parse(err).unwrap_err() {
            ParseError::VenueRejected { code, .. } => assert_eq!(code, "60012"),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(adapter().parse(r#"{"arg":{"channel":"books5"},"data":[]}"#).unwrap(), BookMutation::Ignored);
        assert_eq!(adapter().parse("pong").unwrap(), BookMutation::Heartbeat);
    }
}
