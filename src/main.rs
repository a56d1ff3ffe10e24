// src/main.rs
mod align;
mod analysis;
mod app;
mod config;
mod data_fetch;
mod error;
mod indicators;
mod normalize;
mod pipeline;
mod scheduler;
mod series;
mod trades;
mod web;


use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::ChartEngine;
use crate::config::AppConfig;
use data_fetch::{HttpSource, MarketDataSource, SimulatedSource};
use trades::TradeLog;

#[derive(Parser, Debug)]
struct Cli {
    /// bind host override
    #[arg(long)]
    host: Option<String>,

    /// bind port override
    #[arg(long)]
    port: Option<u16>,

    /// ticker loaded at startup
    #[arg(long)]
    ticker: Option<String>,

    /// serve random-walk data instead of calling the market data service
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::new()?;
    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }
    if let Some(ticker) = cli.ticker {
        cfg.chart.default_ticker = ticker;
    }
    cfg.indicators.validate()?;

    info!("{} {} starting in {} mode", cfg.name, cfg.version, cfg.environment);

    let source: Arc<dyn MarketDataSource> = if cli.simulate {
        info!("Using simulated market data");
        Arc::new(SimulatedSource::new())
    } else {
        Arc::new(HttpSource::new(cfg.source.base_url.clone()))
    };

    let engine = Arc::new(ChartEngine::new(cfg.indicators, cfg.overlays, source));
    let trades = Arc::new(TradeLog::new());

    // The server still comes up if the first fetch fails; the view reports
    // the failed state and a later query can recover.
    let initial = engine
        .clone()
        .set_query(
            cfg.chart.default_ticker.clone(),
            cfg.chart.default_range,
            cfg.chart.default_interval,
        )
        .await;
    if let Err(e) = initial {
        warn!("Initial query for {} failed: {}", cfg.chart.default_ticker, e);
    }

    println!("Service running. Open http://{}/", cfg.get_server_address());
    web::start_web(engine, trades, &cfg.server.host, cfg.server.port).await?;

    Ok(())
}
