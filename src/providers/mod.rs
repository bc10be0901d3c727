pub mod krx;
pub mod naver;
pub mod telegram;
pub mod util;

use crate::core::config::AppConfig;
use crate::core::{HoldingsSource, MarketDataSource};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Live data sources for one run.
pub struct ProviderSet {
    pub market: Arc<dyn MarketDataSource>,
    /// Holdings strategies in the order they are tried.
    pub holdings: Vec<Arc<dyn HoldingsSource>>,
}

pub fn build(config: &AppConfig) -> Result<ProviderSet> {
    let timeout = Duration::from_secs(config.providers.timeout_secs);
    let krx = Arc::new(krx::KrxProvider::new(
        config.providers.krx_base_url(),
        timeout,
    )?);
    let naver = Arc::new(naver::NaverProvider::new(
        config.providers.naver_base_url(),
        timeout,
    )?);

    Ok(ProviderSet {
        market: Arc::clone(&krx) as Arc<dyn MarketDataSource>,
        holdings: vec![
            krx as Arc<dyn HoldingsSource>,
            naver as Arc<dyn HoldingsSource>,
        ],
    })
}
