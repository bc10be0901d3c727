//! Market data abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Display;

/// Investor classes whose net purchases are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvestorType {
    Foreign,
    Institutional,
}

impl InvestorType {
    pub const ALL: [InvestorType; 2] = [InvestorType::Foreign, InvestorType::Institutional];
}

impl Display for InvestorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InvestorType::Foreign => "foreign",
                InvestorType::Institutional => "institutional",
            }
        )
    }
}

/// Exchange sub-markets that report investor flows separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubMarket {
    Kospi,
    Kosdaq,
}

impl SubMarket {
    pub const ALL: [SubMarket; 2] = [SubMarket::Kospi, SubMarket::Kosdaq];
}

impl Display for SubMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SubMarket::Kospi => "KOSPI",
                SubMarket::Kosdaq => "KOSDAQ",
            }
        )
    }
}

/// Closing prices of one ticker, oldest first.
pub type PriceSeries = Vec<f64>;

/// Read-only queries against an end-of-day market data provider.
///
/// Every call may fail or come back empty, notably for dates the exchange
/// was closed. Bulk queries answer for many tickers in one request.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Benchmark index closes on `date`; empty on non-trading days.
    async fn index_closes(&self, date: NaiveDate) -> Result<Vec<f64>>;

    async fn ticker_name(&self, ticker: &str) -> Result<String>;

    async fn price_series(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, PriceSeries>>;

    async fn market_caps(&self, tickers: &[String], date: NaiveDate)
    -> Result<HashMap<String, u64>>;

    /// Net purchase amount per ticker for one investor class in one sub-market.
    async fn net_buys(
        &self,
        date: NaiveDate,
        investor: InvestorType,
        market: SubMarket,
    ) -> Result<HashMap<String, i64>>;

    /// Deviation of the fund's market price from its NAV, in percent.
    async fn nav_deviation(&self, fund_code: &str, date: NaiveDate) -> Result<f64>;
}
