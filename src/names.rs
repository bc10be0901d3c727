use crate::core::cache::KeyValueCollection;
use crate::core::market::MarketDataSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Listed names change rarely, a week-old entry is still good.
pub const NAME_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Display names for tickers, cached across runs.
pub struct NameResolver {
    source: Arc<dyn MarketDataSource>,
    cache: Arc<dyn KeyValueCollection>,
}

impl NameResolver {
    pub fn new(source: Arc<dyn MarketDataSource>, cache: Arc<dyn KeyValueCollection>) -> Self {
        Self { source, cache }
    }

    /// Name of `ticker`, or the ticker itself when no name can be found.
    pub async fn name(&self, ticker: &str) -> String {
        if let Some(bytes) = self.cache.get(ticker.as_bytes()).await
            && let Ok(name) = String::from_utf8(bytes)
        {
            return name;
        }

        match self.source.ticker_name(ticker).await {
            Ok(name) if !name.trim().is_empty() => {
                self.cache
                    .put(ticker.as_bytes(), name.as_bytes(), Some(NAME_TTL))
                    .await;
                name
            }
            Ok(_) => {
                debug!(ticker, "Empty name, using ticker");
                ticker.to_string()
            }
            Err(e) => {
                debug!(ticker, error = %e, "Name lookup failed, using ticker");
                ticker.to_string()
            }
        }
    }
}
