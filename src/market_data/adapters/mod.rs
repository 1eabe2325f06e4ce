// Shared trait + mutation type for venue adapters.
//
// An adapter is the only venue-specific piece: where to connect, what to
// send after the handshake, whether to ping, and how to read a frame.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::ParseResult;
use crate::market_data::venue_book::{PriceLevel, WireLevel};

pub mod binance;
pub mod binance_types;
pub mod bitget;
pub mod bitget_types;
pub mod bybit;
pub mod bybit_types;
pub mod okx;
pub mod okx_types;

pub use binance::BinanceAdapter;
pub use bitget::BitgetAdapter;
pub use bybit::BybitAdapter;
pub use okx::OkxAdapter;

/// Levels carried by one book-data frame, already quantized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelUpdate {
    pub bids: Vec<WireLevel>,
    pub asks: Vec<WireLevel>,
}

impl LevelUpdate {
    /// Levels whose venue prices already sit on the tick grid.
    pub fn on_grid(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            bids: bids.into_iter().map(WireLevel::from).collect(),
            asks: asks.into_iter().map(WireLevel::from).collect(),
        }
    }
}

/// What a frame means for the venue book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookMutation {
    /// Keepalive reply; discard silently.
    Heartbeat,
    /// Subscription acknowledgement; log, no data.
    Acknowledged(String),
    /// Well-formed but irrelevant (other topic, unknown event).
    Ignored,
    /// Complete top-N snapshot: clear and repopulate both sides.
    Replace(LevelUpdate),
    /// Changed venue prices only: quantity 0 deletes, anything else sets.
    Delta(LevelUpdate),
}

/// Streaming connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub secure: bool,
}

impl Endpoint {
    pub fn secure(host: &str, port: u16, path: &str) -> Self {
        Self { host: host.to_string(), port, path: path.to_string(), secure: true }
    }

    pub fn plain(host: &str, port: u16, path: &str) -> Self {
        Self { host: host.to_string(), port, path: path.to_string(), secure: false }
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> &'static str;

    fn tick_size(&self) -> rust_decimal::Decimal;

    fn endpoint(&self) -> Endpoint;

    /// Sent once, immediately after the websocket handshake.
    fn subscribe_payload(&self) -> String;

    /// Application-level ping frame, for venues that need one.
    fn heartbeat(&self) -> Option<String> {
        None
    }

    fn parse(&self, frame: &str) -> ParseResult<BookMutation>;
}

// The longest keepalive reply (Bybit's, with its conn_id) is ~100 bytes.
const MAX_HEARTBEAT_REPLY_LEN: usize = 256;

/// Keepalive replies arrive in several shapes across venues: bare `pong`,
/// `{"pong":true}`, `{"event":"pong"}`, `{"op":"pong"}`, `{"ret_msg":"pong",..}`.
/// Anything longer than a reply can be is rejected before it is inspected.
pub fn is_heartbeat_reply(frame: &str) -> bool {
    if frame.len() > MAX_HEARTBEAT_REPLY_LEN {
        return false;
    }
    let compact: String = frame.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase();
    compact.starts_with("pong") || compact.contains("\"pong\"")
}

/// Instrument symbol as each venue spells it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub base: String,
    pub quote: String,
}

impl Instrument {
    pub fn new(base: &str, quote: &str) -> Self {
        Self { base: base.to_ascii_uppercase(), quote: quote.to_ascii_uppercase() }
    }

    /// `BTCUSDT`
    pub fn concatenated(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// `BTC-USDT`
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }
}

/// Build the adapters for every venue enabled in `settings`.
pub fn enabled_adapters(settings: &Settings) -> Vec<Arc<dyn VenueAdapter>> {
    let instrument = settings.instrument.to_instrument();
    let venues = &settings.venues;
    let mut adapters: Vec<Arc<dyn VenueAdapter>> = Vec::new();
    if venues.binance.enabled {
        adapters.push(Arc::new(BinanceAdapter::new(&instrument, venues.binance.tick_size)));
    }
    if venues.okx.enabled {
        adapters.push(Arc::new(OkxAdapter::new(&instrument, venues.okx.tick_size)));
    }
    if venues.bitget.enabled {
        adapters.push(Arc::new(BitgetAdapter::new(&instrument, venues.bitget.tick_size)));
    }
    if venues.bybit.enabled {
        adapters.push(Arc::new(BybitAdapter::new(&instrument, venues.bybit.tick_size)));
    }
    adapters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_replies_are_recognised() {
        for frame in ["pong", " PONG\n", "{\"pong\":true}", "{ \"event\" : \"pong\" }", "{\"op\":\"pong\"}",
            "{\"success\":true,\"ret_msg\":\"pong\",\"conn_id\":\"x\",\"op\":\"ping\"}"]
        {
            assert!(is_heartbeat_reply(frame), "{frame}");
        }
    }

    #[test]
    fn book_frames_are_not_heartbeats() {
        assert!(!is_heartbeat_reply("{\"lastUpdateId\":1,\"bids\":[],\"asks\":[]}"));
        assert!(!is_heartbeat_reply("{\"event\":\"subscribe\"}"));
    }

    #[test]
    fn long_frames_mentioning_pong_are_not_heartbeats() {
        let levels = vec!["[\"64000.1\",\"0.5\"]"; 40].join(",");
        let frame = format!("{{\"topic\":\"orderbook.50.BTCUSDT\",\"note\":\"pong\",\"b\":[{levels}]}}");
        assert!(frame.len() > MAX_HEARTBEAT_REPLY_LEN);
        assert!(!is_heartbeat_reply(&frame));
        let bybit = "{\"success\":true,\"ret_msg\":\"pong\",\"conn_id\":\"0970e817-426e-429a-a679-ff7f55e0b16a\",\"op\":\"ping\"}";
        assert!(is_heartbeat_reply(bybit));
    }

    #[test]
    fn endpoint_url() {
        assert_eq!(Endpoint::secure("ws.okx.com", 8443, "/ws/v5/public").url(), "wss://ws.okx.com:8443/ws/v5/public");
        assert_eq!(Endpoint::plain("127.0.0.1", 9001, "/").url(), "ws://127.0.0.1:9001/");
    }

    #[test]
    fn instrument_spellings() {
        let i = Instrument::new("btc", "usdt");
        assert_eq!(i.concatenated(), "BTCUSDT");
        assert_eq!(i.dashed(), "BTC-USDT");
    }

    #[test]
    fn all_default_venues_enabled() {
        let settings = Settings::defaults().unwrap();
        let venues: Vec<_> = enabled_adapters(&settings).iter().map(|a| a.venue()).collect();
        assert_eq!(venues, vec!["binance", "okx", "bitget", "bybit"]);
    }
}
