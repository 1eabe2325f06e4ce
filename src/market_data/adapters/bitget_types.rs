// Source: wss://ws.bitget.com/v2/ws/public (Depth channel, books50)
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BitgetFrame {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    /// Sent as a string on some replies and as a number on others.
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Vec<BitgetBook>,
}

#[derive(Debug, Deserialize)]
pub struct BitgetBook {
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub ts: Option<String>,
}
