use crate::constituents::{FetchedHoldings, HoldingsOrigin};
use crate::core::config::AppConfig;
use crate::tracker::Tracker;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .with_context(|| format!("Invalid date '{raw}', expected YYYYMMDD"))
}

fn describe_origin(origin: &HoldingsOrigin) -> String {
    match origin {
        HoldingsOrigin::Live { source, date } => format!("{source} as of {date}"),
        HoldingsOrigin::Partial { source, date } => {
            format!("{source} as of {date} (largest holdings only)")
        }
        HoldingsOrigin::StaticFallback => "static fallback list (may be stale)".to_string(),
    }
}

/// Prints one ETF's constituents, found through the same fallback chain as a run
pub async fn run(config: &AppConfig, code: &str, date: Option<&str>) -> Result<FetchedHoldings> {
    let tracker = Tracker::from_config(config)?;
    let date = match date {
        Some(raw) => parse_date(raw)?,
        None => tracker.resolver().resolve().await,
    };

    let Some(fetched) = tracker.fetcher().fetch(code, date).await else {
        bail!("No constituents found for {code} on or before {date}");
    };

    println!(
        "{code}: {} constituents from {}",
        fetched.constituents.len(),
        describe_origin(&fetched.origin)
    );
    for ticker in fetched.constituents.iter() {
        println!("{ticker}");
    }
    Ok(fetched)
}
