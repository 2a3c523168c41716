//! Command-line arguments of `etl-web-to-store`.

use crate::config::EtlConfig;
use clap::Parser;
use std::path::PathBuf;

/// Download NYC taxi trip datasets, clean them, and upload them to an
/// object store, one pipeline per month.
#[derive(Debug, Parser)]
#[command(name = "etl-web-to-store", version, about)]
pub struct Cli {
    /// Taxi colour
    #[arg(long, default_value = "yellow")]
    pub color: String,

    /// Year of the datasets
    #[arg(long, default_value_t = 2021)]
    pub year: i32,

    /// Months to process, comma-separated
    #[arg(
        long,
        value_delimiter = ',',
        num_args = 1..,
        default_values_t = [1u32, 2, 3],
        value_parser = clap::value_parser!(u32).range(1..=12)
    )]
    pub months: Vec<u32>,

    /// Path to a YAML config file
    #[arg(short, long, env = "ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,

    /// Months processed at the same time, overriding the config
    #[arg(long)]
    pub concurrency: Option<usize>,
}

impl Cli {
    /// Loads the config file, or the defaults, and applies overrides.
    pub fn resolve_config(&self) -> Result<EtlConfig, crate::errors::ConfigError> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::load(path)?,
            None => EtlConfig::default(),
        };
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        Ok(config)
    }
}
