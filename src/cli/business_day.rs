use crate::core::config::AppConfig;
use crate::tracker::Tracker;
use anyhow::Result;
use chrono::NaiveDate;

/// Prints the most recent business day the market data source knows about
pub async fn run(config: &AppConfig) -> Result<NaiveDate> {
    let tracker = Tracker::from_config(config)?;
    let day = tracker.resolver().resolve().await;
    println!("{}", day.format("%Y-%m-%d"));
    Ok(day)
}
