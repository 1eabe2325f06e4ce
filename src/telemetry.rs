use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

pub const FRAMES_TOTAL: &str = "lobx_frames_total";
pub const PARSE_ERRORS_TOTAL: &str = "lobx_parse_errors_total";
pub const RECONNECTS_TOTAL: &str = "lobx_reconnects_total";
pub const MERGES_TOTAL: &str = "lobx_merges_total";
pub const SUBSCRIBERS: &str = "lobx_subscribers";
pub const SUBSCRIBERS_DROPPED_TOTAL: &str = "lobx_subscribers_dropped_total";

/// RUST_LOG wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "prometheus exporter listening on /metrics");
    metrics::gauge!("lobx_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(_addr: SocketAddr) -> anyhow::Result<()> {
    Ok(())
}
