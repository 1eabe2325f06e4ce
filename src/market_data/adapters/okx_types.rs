// Source: wss://ws.okx.com:8443/ws/v5/public (Order book channel, books5)
use serde::Deserialize;

/// Every OKX public frame is an object; which keys are present tells the
/// kind: `event` for control replies, `arg` + `data` for channel pushes.
#[derive(Debug, Deserialize)]
pub struct OkxFrame {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub arg: Option<OkxArg>,
    #[serde(default)]
    pub data: Vec<OkxBook>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxArg {
    pub channel: String,
    #[serde(default)]
    pub inst_id: Option<String>,
}

/// Levels are `[price, size, deprecated, order_count]`.
#[derive(Debug, Deserialize)]
pub struct OkxBook {
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub ts: Option<String>,
}
