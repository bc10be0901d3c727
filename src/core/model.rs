//! Records produced by a tracking run

use crate::core::holdings::ConstituentSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last-known constituents per fund code.
pub type HistoryState = BTreeMap<String, ConstituentSet>;

/// Same-day metrics of one constituent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerMetric {
    pub code: String,
    pub name: String,
    /// Percent change of the close against the previous close.
    pub change_rate: f64,
    pub net_foreign: i64,
    pub net_institutional: i64,
    pub market_cap: u64,
    /// Percent of the fund's total constituent market cap.
    pub weight: f64,
}

impl TickerMetric {
    pub fn empty(code: &str, name: &str) -> Self {
        TickerMetric {
            code: code.to_string(),
            name: name.to_string(),
            change_rate: 0.0,
            net_foreign: 0,
            net_institutional: 0,
            market_cap: 0,
            weight: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedTicker {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub added: Vec<NamedTicker>,
    pub removed: Vec<NamedTicker>,
}

impl ChangeRecord {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundDashboard {
    pub name: String,
    pub code: String,
    pub total_constituents: usize,
    /// Name of the source the constituents came from, `static` for the
    /// built-in lists.
    pub source: String,
    /// The constituents are a partial or static stand-in. They were neither
    /// diffed nor written to history.
    pub stale: bool,
    pub deviation: f64,
    pub recent_changes: ChangeRecord,
    pub gainers: Vec<TickerMetric>,
    pub losers: Vec<TickerMetric>,
    pub foreign_buys: Vec<TickerMetric>,
    pub inst_buys: Vec<TickerMetric>,
    pub top_weights: Vec<TickerMetric>,
    pub constituents: Vec<TickerMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub last_updated: String,
    pub business_day: NaiveDate,
    pub etfs: BTreeMap<String, FundDashboard>,
}

impl DashboardSnapshot {
    pub fn new(last_updated: String, business_day: NaiveDate) -> Self {
        DashboardSnapshot {
            last_updated,
            business_day,
            etfs: BTreeMap::new(),
        }
    }
}
