use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Transport-level failures of a venue session. Every variant ends the
/// current session and is recovered by the connector's reconnect loop.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },

    #[error("tcp connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("websocket handshake failed: {0}")]
    Handshake(#[source] tungstenite::Error),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("no frame received for {after:?}")]
    Idle { after: Duration },

    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}

/// A single inbound frame could not be turned into a book mutation.
/// The frame is dropped; the connector keeps streaming.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("price level has {0} fields, expected at least 2")]
    MalformedLevel(usize),

    #[error("venue rejected request (code {code}): {message}")]
    VenueRejected { code: String, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures that stop the process before it can serve subscribers.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("grpc server failed: {0}")]
    Serve(#[from] tonic::transport::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ParseResult<T> = Result<T, ParseError>;
