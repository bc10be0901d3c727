use crate::core::config::AppConfig;
use crate::tracker::{RunOptions, RunReport, Tracker};
use anyhow::Result;
use tracing::{info, warn};

/// Runs the tracking job for every enabled ETF
pub async fn run(config: &AppConfig, options: RunOptions) -> Result<RunReport> {
    let funds = config.enabled_funds();
    if funds.is_empty() {
        warn!("All configured ETFs are disabled");
    }

    let tracker = Tracker::from_config(config)?;
    let report = tracker.run(&funds, options).await?;

    info!(
        business_day = %report.business_day,
        processed = report.processed,
        skipped = report.skipped.len(),
        changed = report.changed.len(),
        notified = report.notified,
        "Run complete"
    );
    Ok(report)
}
