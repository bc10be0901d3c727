//! Scripted in-memory collaborators for unit tests

use crate::core::holdings::HoldingsSource;
use crate::core::market::{InvestorType, MarketDataSource, PriceSeries, SubMarket};
use crate::core::model::{DashboardSnapshot, HistoryState};
use crate::core::notify::Notifier;
use crate::store::snapshot::SnapshotStore;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct FakeMarket {
    trading_days: HashSet<NaiveDate>,
    names: HashMap<String, String>,
    series: HashMap<String, PriceSeries>,
    caps: HashMap<String, u64>,
    flows: HashMap<(InvestorType, SubMarket), HashMap<String, i64>>,
    deviation: Option<f64>,
    fail_all: bool,
    pub index_calls: AtomicUsize,
    pub name_calls: AtomicUsize,
}

impl FakeMarket {
    pub fn trading_day(mut self, date: NaiveDate) -> Self {
        self.trading_days.insert(date);
        self
    }

    pub fn name(mut self, ticker: &str, name: &str) -> Self {
        self.names.insert(ticker.to_string(), name.to_string());
        self
    }

    pub fn closes(mut self, ticker: &str, closes: &[f64]) -> Self {
        self.series.insert(ticker.to_string(), closes.to_vec());
        self
    }

    pub fn cap(mut self, ticker: &str, cap: u64) -> Self {
        self.caps.insert(ticker.to_string(), cap);
        self
    }

    pub fn flow(
        mut self,
        investor: InvestorType,
        market: SubMarket,
        ticker: &str,
        amount: i64,
    ) -> Self {
        self.flows
            .entry((investor, market))
            .or_default()
            .insert(ticker.to_string(), amount);
        self
    }

    pub fn deviation(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    /// Every query errors.
    pub fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    fn check(&self) -> Result<()> {
        if self.fail_all {
            Err(anyhow!("upstream unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MarketDataSource for FakeMarket {
    async fn index_closes(&self, date: NaiveDate) -> Result<Vec<f64>> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(if self.trading_days.contains(&date) {
            vec![2722.67]
        } else {
            Vec::new()
        })
    }

    async fn ticker_name(&self, ticker: &str) -> Result<String> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.names
            .get(ticker)
            .cloned()
            .ok_or_else(|| anyhow!("unknown ticker {ticker}"))
    }

    async fn price_series(
        &self,
        tickers: &[String],
        _date: NaiveDate,
    ) -> Result<HashMap<String, PriceSeries>> {
        self.check()?;
        Ok(tickers
            .iter()
            .filter_map(|t| self.series.get(t).map(|s| (t.clone(), s.clone())))
            .collect())
    }

    async fn market_caps(
        &self,
        tickers: &[String],
        _date: NaiveDate,
    ) -> Result<HashMap<String, u64>> {
        self.check()?;
        Ok(tickers
            .iter()
            .filter_map(|t| self.caps.get(t).map(|c| (t.clone(), *c)))
            .collect())
    }

    async fn net_buys(
        &self,
        _date: NaiveDate,
        investor: InvestorType,
        market: SubMarket,
    ) -> Result<HashMap<String, i64>> {
        self.check()?;
        self.flows
            .get(&(investor, market))
            .cloned()
            .ok_or_else(|| anyhow!("no {investor} flows for {market}"))
    }

    async fn nav_deviation(&self, fund_code: &str, _date: NaiveDate) -> Result<f64> {
        self.check()?;
        self.deviation
            .ok_or_else(|| anyhow!("no deviation for {fund_code}"))
    }
}

/// Holdings keyed by fund and date; anything else errors.
pub struct FakeHoldings {
    label: &'static str,
    complete: bool,
    holdings: HashMap<(String, NaiveDate), Vec<String>>,
    pub calls: Mutex<Vec<(String, NaiveDate)>>,
}

impl FakeHoldings {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            complete: true,
            holdings: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, fund_code: &str, date: NaiveDate, tickers: &[&str]) -> Self {
        self.holdings.insert(
            (fund_code.to_string(), date),
            tickers.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Reports only an excerpt of each fund, like a top-ten listing.
    pub fn partial(mut self) -> Self {
        self.complete = false;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HoldingsSource for FakeHoldings {
    fn name(&self) -> &str {
        self.label
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    async fn holdings(&self, fund_code: &str, date: NaiveDate) -> Result<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((fund_code.to_string(), date));
        self.holdings
            .get(&(fund_code.to_string(), date))
            .cloned()
            .ok_or_else(|| anyhow!("no holdings for {fund_code} on {date}"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(anyhow!("delivery failed"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    pub history: Mutex<HistoryState>,
    pub dashboard: Mutex<Option<DashboardSnapshot>>,
    pub history_writes: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn with_history(history: HistoryState) -> Self {
        Self {
            history: Mutex::new(history),
            ..Self::default()
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load_history(&self) -> Result<HistoryState> {
        Ok(self.history.lock().unwrap().clone())
    }

    fn save_history(&self, history: &HistoryState) -> Result<()> {
        self.history_writes.fetch_add(1, Ordering::SeqCst);
        *self.history.lock().unwrap() = history.clone();
        Ok(())
    }

    fn save_dashboard(&self, snapshot: &DashboardSnapshot) -> Result<()> {
        *self.dashboard.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
