// Source: wss://stream.binance.com:9443/ws (Partial Book Depth Streams)
use serde::Deserialize;

/// Inbound frame: either a depth snapshot or a reply to our SUBSCRIBE.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BinanceFrame {
    Depth(PartialDepth),
    Reply(RequestReply),
}

/// `{"lastUpdateId":160,"bids":[["0.0024","10"]],"asks":[["0.0026","100"]]}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialDepth {
    pub last_update_id: u64,
    pub bids: Vec<Vec<String>>,
    pub asks: Vec<Vec<String>>,
}

/// `{"result":null,"id":1}` on success, `{"error":{"code":2,"msg":".."},"id":1}` on failure.
#[derive(Debug, Deserialize)]
pub struct RequestReply {
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyError {
    pub code: i64,
    pub msg: String,
}
