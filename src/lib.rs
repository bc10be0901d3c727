pub mod calendar;
pub mod changes;
pub mod cli;
pub mod constituents;
pub mod core;
pub mod metrics;
pub mod names;
pub mod providers;
pub mod store;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_support;

use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Run { dry_run: bool },
    BusinessDay,
    Holdings { code: String, date: Option<String> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ETF watch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Run { dry_run } => {
            cli::run::run(&config, tracker::RunOptions { dry_run }).await?;
        }
        AppCommand::BusinessDay => {
            cli::business_day::run(&config).await?;
        }
        AppCommand::Holdings { code, date } => {
            cli::holdings::run(&config, &code, date.as_deref()).await?;
        }
    }
    Ok(())
}
