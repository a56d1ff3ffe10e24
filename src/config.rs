// src/config.rs
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::env;

use crate::pipeline::{IndicatorParams, ToggleSet};
use crate::series::{Interval, Range};

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub default_ticker: String,
    pub default_range: Range,
    pub default_interval: Interval,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
    pub environment: String,
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub chart: ChartConfig,
    pub indicators: IndicatorParams,
    pub overlays: ToggleSet,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::new("config/default.toml", FileFormat::Toml))
            .add_source(
                File::new(&format!("config/{}.toml", run_mode), FileFormat::Toml).required(false),
            )
            .add_source(config::Environment::with_prefix("APP"))
            .build()?;

        config.try_deserialize()
    }

    pub fn get_server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
