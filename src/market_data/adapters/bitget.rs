// Bitget books50 adapter: full top-50 snapshots wrapped in `action: "snapshot"`.

use rust_decimal::Decimal;
use serde_json::json;

use super::bitget_types::BitgetFrame;
use super::{is_heartbeat_reply, BookMutation, Endpoint, Instrument, LevelUpdate, VenueAdapter};
use crate::error::{ParseError, ParseResult};
use crate::market_data::normaliser::Normaliser;
use crate::market_data::venue_book::Side;

pub const CHANNEL: &str = "books50";

pub struct BitgetAdapter {
    pub inst_id: String, // e.g. "BTCUSDT"
    pub normaliser: Normaliser,
}

impl BitgetAdapter {
    pub const VENUE: &'static str = "bitget";

    pub fn new(instrument: &Instrument, tick_size: Decimal) -> Self {
        Self { inst_id: instrument.concatenated(), normaliser: Normaliser::new(tick_size) }
    }
}

fn code_text(code: &serde_json::Value) -> String {
    match code {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl VenueAdapter for BitgetAdapter {
    fn venue(&self) -> &'static str {
        Self::VENUE
    }

    fn tick_size(&self) -> Decimal {
        self.normaliser.tick_size
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint::secure("ws.bitget.com", 443, "/v2/ws/public")
    }

    fn subscribe_payload(&self) -> String {
        json!({
            "op": "subscribe",
            "args": [{ "instType": "SPOT", "channel": CHANNEL, "instId": self.inst_id }]
        })
        .to_string()
    }

    // Bitget drops idle sockets unless it sees a plain-text ping.
    fn heartbeat(&self) -> Option<String> {
        Some("ping".to_string())
    }

    fn parse(&self, frame: &str) -> ParseResult<BookMutation> {
        if is_heartbeat_reply(frame) {
            return Ok(BookMutation::Heartbeat);
        }
        let frame: BitgetFrame = serde_json::from_str(frame)?;
        let code = frame.code.as_ref().map(code_text);

        if frame.event.as_deref() == Some("error") {
            return Err(ParseError::VenueRejected {
                code: code.unwrap_or_default(),
                message: frame.msg.unwrap_or_default(),
            });
        }
        if frame.event.as_deref() == Some("subscribe") || code.as_deref() == Some("0") {
            return Ok(BookMutation::Acknowledged(format!("subscribed to {} {}", CHANNEL, self.inst_id)));
        }
        if frame.action.as_deref() != Some("snapshot") {
            return Ok(BookMutation::Ignored);
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
