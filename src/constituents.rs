//! Resilient acquisition of one fund's constituent set

use crate::calendar::walk_back;
use crate::core::holdings::{ConstituentSet, HoldingsSource};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

// Snapshots of large index funds used when every live source is down.
// They are never refreshed automatically; override them in the config.
const KODEX_200: [&str; 30] = [
    "005930", "000660", "373220", "207940", "005380", "000270", "068270", "005490", "035420",
    "051910", "006400", "105560", "055550", "012330", "028260", "035720", "003670", "066570",
    "086790", "032830", "015760", "034730", "003550", "096770", "017670", "033780", "009150",
    "018260", "010130", "011200",
];

const KODEX_MSCI_KOREA: [&str; 25] = [
    "005930", "000660", "373220", "207940", "005380", "000270", "068270", "005490", "035420",
    "051910", "006400", "105560", "055550", "012330", "028260", "035720", "086790", "032830",
    "015760", "329180", "012450", "259960", "010950", "316140", "138040",
];

pub fn builtin_fallbacks() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "069500".to_string(),
            KODEX_200.iter().map(|t| t.to_string()).collect(),
        ),
        (
            "273620".to_string(),
            KODEX_MSCI_KOREA.iter().map(|t| t.to_string()).collect(),
        ),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingsOrigin {
    Live { source: String, date: NaiveDate },
    /// Excerpt from a source that does not publish full compositions.
    Partial { source: String, date: NaiveDate },
    StaticFallback,
}

impl HoldingsOrigin {
    /// Whether the set is the fund's full composition for a real date and
    /// may be diffed against and stored as history.
    pub fn is_authoritative(&self) -> bool {
        matches!(self, HoldingsOrigin::Live { .. })
    }

    pub fn source(&self) -> &str {
        match self {
            HoldingsOrigin::Live { source, .. } | HoldingsOrigin::Partial { source, .. } => source,
            HoldingsOrigin::StaticFallback => "static",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedHoldings {
    pub constituents: ConstituentSet,
    pub origin: HoldingsOrigin,
}

pub struct ConstituentFetcher {
    sources: Vec<Arc<dyn HoldingsSource>>,
    partial_sources: Vec<Arc<dyn HoldingsSource>>,
    fallbacks: BTreeMap<String, Vec<String>>,
    attempts: usize,
}

impl ConstituentFetcher {
    /// Complete `sources` are tried in order for each date, newest date
    /// first. Partial ones are only asked once that walk found nothing.
    pub fn new(sources: Vec<Arc<dyn HoldingsSource>>, attempts: usize) -> Self {
        let (sources, partial_sources): (Vec<_>, Vec<_>) =
            sources.into_iter().partition(|source| source.is_complete());
        Self {
            sources,
            partial_sources,
            fallbacks: builtin_fallbacks(),
            attempts,
        }
    }

    /// Adds or replaces static lists by fund code.
    pub fn with_fallbacks(mut self, overrides: &BTreeMap<String, Vec<String>>) -> Self {
        self.fallbacks.extend(overrides.clone());
        self
    }

    /// Current constituents of `fund_code`, or `None` when no source and no
    /// static list produced any.
    pub async fn fetch(&self, fund_code: &str, target: NaiveDate) -> Option<FetchedHoldings> {
        let live = walk_back(target, self.attempts, |date| async move {
            Ok::<_, anyhow::Error>(self.try_sources(&self.sources, fund_code, date).await)
        })
        .await;

        if let Some((date, (source, constituents))) = live {
            info!(
                fund = fund_code,
                %source,
                %date,
                count = constituents.len(),
                "Fetched constituents"
            );
            return Some(FetchedHoldings {
                constituents,
                origin: HoldingsOrigin::Live { source, date },
            });
        }

        if let Some((source, constituents)) = self
            .try_sources(&self.partial_sources, fund_code, target)
            .await
        {
            warn!(
                fund = fund_code,
                %source,
                count = constituents.len(),
                "Full holdings unavailable, using partial list"
            );
            return Some(FetchedHoldings {
                constituents,
                origin: HoldingsOrigin::Partial {
                    source,
                    date: target,
                },
            });
        }

        let constituents = self
            .fallbacks
            .get(fund_code)
            .map(|list| ConstituentSet::from_holdings(fund_code, list))
            .filter(|set| !set.is_empty())?;
        warn!(
            fund = fund_code,
            count = constituents.len(),
            "Live holdings unavailable, using static fallback list which may be stale"
        );
        Some(FetchedHoldings {
            constituents,
            origin: HoldingsOrigin::StaticFallback,
        })
    }

    async fn try_sources(
        &self,
        sources: &[Arc<dyn HoldingsSource>],
        fund_code: &str,
        date: NaiveDate,
    ) -> Option<(String, ConstituentSet)> {
        for source in sources {
            match source.holdings(fund_code, date).await {
                Ok(raw) => {
                    let set = ConstituentSet::from_holdings(fund_code, &raw);
                    if !set.is_empty() {
                        return Some((source.name().to_string(), set));
                    }
                    debug!(fund = fund_code, source = source.name(), %date, "Empty holdings");
                }
                Err(e) => {
                    debug!(
                        fund = fund_code,
                        source = source.name(),
                        %date,
                        error = %e,
                        "Holdings query failed"
                    );
                }
            }
        }
        None
    }
}
