use crate::core::holdings::HoldingsSource;
use crate::providers::util::{RETRIES, RETRY_DELAY_MS, http_client, with_retry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct EtfAnalysisResponse {
    #[serde(rename = "etfTop10MajorConstituentAssets", default)]
    constituents: Vec<ConstituentAsset>,
}

#[derive(Debug, Deserialize)]
struct ConstituentAsset {
    #[serde(rename = "itemCode")]
    item_code: Option<String>,
}

/// Alternate holdings source backed by the mobile stock site's ETF analysis.
///
/// Only the current top ten holdings are published, so the requested date
/// is ignored and the list is partial.
pub struct NaverProvider {
    base_url: String,
    client: reqwest::Client,
}

impl NaverProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(NaverProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl HoldingsSource for NaverProvider {
    fn name(&self) -> &str {
        "naver"
    }

    fn is_complete(&self) -> bool {
        false
    }

    #[instrument(name = "NaverHoldings", skip(self, _date))]
    async fn holdings(&self, fund_code: &str, _date: NaiveDate) -> Result<Vec<String>> {
        let url = format!("{}/api/stock/{}/etfAnalysis", self.base_url, fund_code);
        debug!("Requesting ETF analysis from {}", url);

        let response = with_retry(
            || async { self.client.get(&url).send().await },
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Failed to send request for ETF: {fund_code}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ETF: {}",
                response.status(),
                fund_code
            ));
        }

        let analysis: EtfAnalysisResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse ETF analysis for: {fund_code}"))?;

        Ok(analysis
            .constituents
            .into_iter()
            .filter_map(|asset| asset.item_code)
            .collect())
    }
}
