use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use lobx_aggregator::config::Settings;
use lobx_aggregator::market_data::router::Pipeline;
use lobx_aggregator::publish::server::{self, BookStreamService};
use lobx_aggregator::telemetry;

/// Consolidated BTC/USDT order book from Binance, OKX, Bitget and Bybit,
/// streamed over gRPC.
#[derive(Parser, Debug)]
#[command(name = "lobx-aggregator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file layered over the built-in defaults
    #[arg(short, long, env = "LOBX_CONFIG")]
    config: Option<PathBuf>,

    /// Override server.listen_addr
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override telemetry.log_filter (RUST_LOG still wins)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(addr) = cli.listen {
        settings.server.listen_addr = addr;
    }
    if let Some(filter) = cli.log_filter {
        settings.telemetry.log_filter = filter;
    }

    telemetry::init_tracing(&settings.telemetry.log_filter);
    telemetry::init_metrics(settings.telemetry.metrics_addr)?;

    // bind first: a taken port should stop us before any venue is dialled
    let listener = server::bind(settings.server.listen_addr).await?;
    warn!(
        addr = %settings.server.listen_addr,
        "gRPC publisher is plaintext and unauthenticated; expose it on trusted networks only"
    );

    let pipeline = Pipeline::from_settings(&settings);
    let service = BookStreamService::new(pipeline.publisher(), settings.server.subscriber_buffer);
    pipeline.start();

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("ctrl-c received, shutting down"),
            Err(e) => error!(error = %e, "cannot listen for ctrl-c, shutting down"),
        }
    };
    let served = server::serve(listener, service, shutdown).await;

    pipeline.stop().await;
    served?;
    info!("bye");
    Ok(())
}
