use crate::core::cache::Cache;
use crate::core::holdings::HoldingsSource;
use crate::core::market::{InvestorType, MarketDataSource, PriceSeries, SubMarket};
use crate::providers::util::{RETRIES, RETRY_DELAY_MS, http_client, with_retry};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const DATA_ENDPOINT: &str = "/comm/bldAttendant/getJsonData.cmd";

// Report ids understood by the data endpoint
const INDEX_PRICES: &str = "dbms/MDC/STAT/standard/MDCSTAT00301";
const LISTED_ISSUES: &str = "dbms/MDC/STAT/standard/MDCSTAT01901";
const DAILY_QUOTES: &str = "dbms/MDC/STAT/standard/MDCSTAT01501";
const NET_PURCHASES: &str = "dbms/MDC/STAT/standard/MDCSTAT02401";
const ETF_LISTING: &str = "dbms/MDC/STAT/standard/MDCSTAT04601";
const PORTFOLIO_DEPOSIT: &str = "dbms/MDC/STAT/standard/MDCSTAT05001";
const PRICE_DEVIATION: &str = "dbms/MDC/STAT/standard/MDCSTAT06001";

const ROW_BLOCKS: [&str; 3] = ["output", "OutBlock_1", "block1"];

type Row = HashMap<String, Value>;

// Failures are kept as rendered messages so they can be replayed
type ReportOutcome = Result<Arc<Vec<Row>>, String>;

/// Exchange data-portal client. Every query is a form POST naming a report.
pub struct KrxProvider {
    base_url: String,
    client: reqwest::Client,
    reports: Cache<String, ReportOutcome>,
}

impl KrxProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(KrxProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            reports: Cache::new(),
        })
    }

    /// Rows of one report, fetched at most once per run.
    ///
    /// A failed request is remembered too, so an outage costs one request
    /// per report rather than one per caller.
    async fn report(&self, bld: &str, params: &[(&str, String)]) -> Result<Arc<Vec<Row>>> {
        let key = std::iter::once(bld.to_string())
            .chain(params.iter().map(|(k, v)| format!("{k}={v}")))
            .collect::<Vec<_>>()
            .join("&");
        self.reports
            .get_or_insert_with(key, || async {
                self.fetch_report(bld, params)
                    .await
                    .map(Arc::new)
                    .map_err(|e| format!("{e:#}"))
            })
            .await
            .map_err(|e| anyhow!(e))
    }

    #[instrument(name = "KrxReport", skip(self, params), fields(bld = %bld))]
    async fn fetch_report(&self, bld: &str, params: &[(&str, String)]) -> Result<Vec<Row>> {
        let url = format!("{}{}", self.base_url, DATA_ENDPOINT);
        let mut form: Vec<(&str, &str)> = vec![("bld", bld)];
        form.extend(params.iter().map(|(k, v)| (*k, v.as_str())));
        debug!("Requesting report from {}", url);

        let response = with_retry(
            || async { self.client.post(&url).form(&form).send().await },
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Failed to send request for report: {bld}"))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for report: {}",
                response.status(),
                bld
            ));
        }

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for report: {bld}"))?;
        parse_rows(&text).with_context(|| format!("Failed to parse report: {bld}"))
    }

    async fn isin(&self, fund_code: &str) -> Result<String> {
        let rows = self.report(ETF_LISTING, &[]).await?;
        rows.iter()
            .find(|row| text(row, "ISU_SRT_CD").as_deref() == Some(fund_code))
            .and_then(|row| text(row, "ISU_CD"))
            .ok_or_else(|| anyhow!("No ISIN found for ETF: {}", fund_code))
    }

    async fn daily_quotes(&self, date: NaiveDate) -> Result<Arc<Vec<Row>>> {
        self.report(
            DAILY_QUOTES,
            &[("mktId", "ALL".to_string()), ("trdDd", krx_date(date))],
        )
        .await
    }
}

fn krx_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

fn parse_rows(text: &str) -> Result<Vec<Row>> {
    if text.trim().is_empty() {
        bail!("Received empty response");
    }
    let body: HashMap<String, Value> = serde_json::from_str(text)?;
    for block in ROW_BLOCKS {
        if let Some(Value::Array(items)) = body.get(block) {
            return Ok(items
                .iter()
                .filter_map(Value::as_object)
                .map(|obj| obj.clone().into_iter().collect())
                .collect());
        }
    }
    bail!("No data block in response")
}

fn text(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "-").then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses comma-grouped numbers such as `"-1,234.5"`.
fn number(row: &Row, key: &str) -> Option<f64> {
    text(row, key)?.replace(',', "").parse().ok()
}

fn integer(row: &Row, key: &str) -> Option<i64> {
    let raw = text(row, key)?.replace(',', "");
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|v| v as i64))
}

fn market_id(market: SubMarket) -> &'static str {
    match market {
        SubMarket::Kospi => "STK",
        SubMarket::Kosdaq => "KSQ",
    }
}

fn investor_code(investor: InvestorType) -> &'static str {
    match investor {
        InvestorType::Foreign => "9000",
        InvestorType::Institutional => "7050",
    }
}

#[async_trait]
impl MarketDataSource for KrxProvider {
    async fn index_closes(&self, date: NaiveDate) -> Result<Vec<f64>> {
        let day = krx_date(date);
        let rows = self
            .report(
                INDEX_PRICES,
                &[
                    ("indIdx", "1".to_string()),
                    ("indIdx2", "001".to_string()),
                    ("strtDd", day.clone()),
                    ("endDd", day),
                ],
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(|row| number(row, "CLSPRC_IDX"))
            .collect())
    }

    async fn ticker_name(&self, ticker: &str) -> Result<String> {
        let issues = self
            .report(LISTED_ISSUES, &[("mktId", "ALL".to_string())])
            .await?;
        if let Some(name) = issues
            .iter()
            .find(|row| text(row, "ISU_SRT_CD").as_deref() == Some(ticker))
            .and_then(|row| text(row, "ISU_ABBRV"))
        {
            return Ok(name);
        }

        let etfs = self.report(ETF_LISTING, &[]).await?;
        etfs.iter()
            .find(|row| text(row, "ISU_SRT_CD").as_deref() == Some(ticker))
            .and_then(|row| text(row, "ISU_ABBRV"))
            .ok_or_else(|| anyhow!("No name found for ticker: {}", ticker))
    }

    async fn price_series(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, PriceSeries>> {
        let wanted: HashSet<&str> = tickers.iter().map(String::as_str).collect();
        let rows = self.daily_quotes(date).await?;

        let mut series = HashMap::new();
        for row in rows.iter() {
            let Some(code) = text(row, "ISU_SRT_CD").filter(|c| wanted.contains(c.as_str()))
            else {
                continue;
            };
            let closes = match (number(row, "TDD_CLSPRC"), number(row, "CMPPREVDD_PRC")) {
                (Some(close), Some(change)) => vec![close - change, close],
                (Some(close), None) => vec![close],
                _ => continue,
            };
            series.insert(code, closes);
        }
        Ok(series)
    }

    async fn market_caps(
        &self,
        tickers: &[String],
        date: NaiveDate,
    ) -> Result<HashMap<String, u64>> {
        let wanted: HashSet<&str> = tickers.iter().map(String::as_str).collect();
        let rows = self.daily_quotes(date).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let code = text(row, "ISU_SRT_CD").filter(|c| wanted.contains(c.as_str()))?;
                let cap = u64::try_from(integer(row, "MKTCAP")?).ok()?;
                Some((code, cap))
            })
            .collect())
    }

    async fn net_buys(
        &self,
        date: NaiveDate,
        investor: InvestorType,
        market: SubMarket,
    ) -> Result<HashMap<String, i64>> {
        let day = krx_date(date);
        let rows = self
            .report(
                NET_PURCHASES,
                &[
                    ("strtDd", day.clone()),
                    ("endDd", day),
                    ("mktId", market_id(market).to_string()),
                    ("invstTpCd", investor_code(investor).to_string()),
                ],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| Some((text(row, "ISU_SRT_CD")?, integer(row, "NETBID_TRDVAL")?)))
            .collect())
    }

    async fn nav_deviation(&self, fund_code: &str, date: NaiveDate) -> Result<f64> {
        let isin = self.isin(fund_code).await?;
        let day = krx_date(date);
        let rows = self
            .report(
                PRICE_DEVIATION,
                &[("strtDd", day.clone()), ("endDd", day), ("isuCd", isin)],
            )
            .await?;

        rows.iter()
            .rev()
            .find_map(|row| number(row, "DIVRG_RT"))
            .ok_or_else(|| anyhow!("No deviation data for ETF: {} on {}", fund_code, date))
    }
}

#[async_trait]
impl HoldingsSource for KrxProvider {
    fn name(&self) -> &str {
        "krx"
    }

    async fn holdings(&self, fund_code: &str, date: NaiveDate) -> Result<Vec<String>> {
        let isin = self.isin(fund_code).await?;
        let rows = self
            .report(
                PORTFOLIO_DEPOSIT,
                &[("trdDd", krx_date(date)), ("isuCd", isin)],
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| text(row, "COMPST_ISU_CD"))
            .collect())
    }
}
