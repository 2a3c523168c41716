//! etl-web-to-store - runs the parent flow for one colour, year, and list
//! of months.

use anyhow::Context;
use clap::Parser;
use taskflow_etl::cli::Cli;
use taskflow_etl::flow::EtlFlow;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("Invalid log level '{}'", cli.log_level))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if cli.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Cannot install log subscriber: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let config = cli.resolve_config().context("Loading configuration")?;
    info!(
        color = %cli.color,
        year = cli.year,
        months = ?cli.months,
        base_url = %config.base_url,
        "Starting parent flow"
    );

    let flow = EtlFlow::from_config(&config)?;
    let report = flow.run_parent(&cli.color, cli.year, &cli.months).await;
    println!("{report}");

    if let Some(failure) = report.partial_failure() {
        error!(failed = failure.failures.len(), attempted = failure.attempted, "Parent flow finished with failures");
        return Err(failure.into());
    }
    info!(attempted = report.attempted(), "Parent flow finished");
    Ok(())
}
