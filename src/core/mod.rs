//! Core domain types and the seams to external services

pub mod cache;
pub mod config;
pub mod holdings;
pub mod log;
pub mod market;
pub mod model;
pub mod notify;

// Re-export main types for cleaner imports
pub use holdings::{ConstituentSet, HoldingsSource};
pub use market::{InvestorType, MarketDataSource, PriceSeries, SubMarket};
pub use model::{
    ChangeRecord, DashboardSnapshot, FundDashboard, HistoryState, NamedTicker, TickerMetric,
};
pub use notify::Notifier;
