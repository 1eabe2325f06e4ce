//! Layered configuration: built-in defaults, an optional TOML file, then
//! `LOBX_*` environment variables (`__` separates nested keys).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::market_data::adapters::Instrument;

const DEFAULTS: &str = r#"
[server]
listen_addr = "0.0.0.0:50051"
subscriber_buffer = 64

[connector]
reconnect_delay_ms = 5000
heartbeat_interval_ms = 15000
connect_timeout_ms = 10000
idle_timeout_ms = 60000

[book]
depth = 100

[instrument]
base = "BTC"
quote = "USDT"

[venues.binance]
enabled = true
tick_size = "0.1"

[venues.okx]
enabled = true
tick_size = "0.1"

[venues.bitget]
enabled = true
tick_size = "0.1"

[venues.bybit]
enabled = true
tick_size = "0.1"

[telemetry]
log_filter = "info"
metrics_addr = "0.0.0.0:9000"
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub connector: ConnectorSettings,
    pub book: BookSettings,
    pub instrument: InstrumentSettings,
    pub venues: VenueSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Plain-text gRPC listener. Trusted networks only.
    pub listen_addr: SocketAddr,
    /// Updates queued per subscriber before it is dropped as too slow.
    pub subscriber_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorSettings {
    pub reconnect_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub idle_timeout_ms: u64,
}

impl ConnectorSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookSettings {
    pub depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentSettings {
    pub base: String,
    pub quote: String,
}

impl InstrumentSettings {
    pub fn to_instrument(&self) -> Instrument {
        Instrument::new(&self.base, &self.quote)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueSettings {
    pub binance: VenueToggle,
    pub okx: VenueToggle,
    pub bitget: VenueToggle,
    pub bybit: VenueToggle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueToggle {
    pub enabled: bool,
    /// <= 0 disables quantization for the venue.
    pub tick_size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    pub log_filter: String,
    pub metrics_addr: SocketAddr,
}

impl Settings {
    /// Load defaults, then `path` (if given, must exist), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let settings: Settings = builder
            .add_source(Environment::with_prefix("LOBX").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| Err(ConfigError::Invalid { field, reason: reason.to_string() });
        if self.book.depth == 0 {
            return invalid("book.depth", "must be at least 1");
        }
        if self.server.subscriber_buffer == 0 {
            return invalid("server.subscriber_buffer", "must be at least 1");
        }
        if self.connector.reconnect_delay_ms == 0 {
            return invalid("connector.reconnect_delay_ms", "must be positive");
        }
        if self.connector.heartbeat_interval_ms == 0 {
            return invalid("connector.heartbeat_interval_ms", "must be positive");
        }
        if self.connector.connect_timeout_ms == 0 || self.connector.idle_timeout_ms == 0 {
            return invalid("connector timeouts", "must be positive");
        }
        let v = &self.venues;
        if ![&v.binance, &v.okx, &v.bitget, &v.bybit].iter().any(|t| t.enabled) {
            return invalid("venues", "at least one venue must be enabled");
        }
        Ok(())
    }

    /// The embedded defaults alone, ignoring files and the environment.
    pub fn defaults() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
