// Source: wss://stream.bybit.com/v5/public/spot (Orderbook topic)
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BybitFrame {
    /// Present on operation replies (subscribe / ping).
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: Option<String>,
    #[serde(default)]
    pub op: Option<String>,
    /// Present on topic pushes.
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<BybitBook>,
}

/// `b` / `a` are `[price, size]`; size "0" in a delta removes the level.
#[derive(Debug, Deserialize)]
pub struct BybitBook {
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub b: Vec<Vec<String>>,
    #[serde(default)]
    pub a: Vec<Vec<String>>,
    #[serde(default)]
    pub u: Option<u64>,
    #[serde(default)]
    pub seq: Option<u64>,
}
