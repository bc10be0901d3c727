//! Constituent sets and the sources that report them

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const TICKER_LEN: usize = 6;

/// Reduces a holding identifier to a bare exchange ticker.
///
/// Drops an exchange suffix (`005930.KS`) and keeps the last six characters
/// of longer identifiers (`A005930`). Already-bare tickers pass unchanged.
pub fn normalize_ticker(raw: &str) -> String {
    let trimmed = raw.trim();
    let bare = trimmed.split_once('.').map_or(trimmed, |(head, _)| head).trim();

    let chars: Vec<char> = bare.chars().collect();
    if chars.len() > TICKER_LEN {
        chars[chars.len() - TICKER_LEN..].iter().collect()
    } else {
        bare.to_string()
    }
}

/// Tickers held by one fund on one business day.
///
/// Keeps the order the source reported and never holds a ticker twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ConstituentSet {
    tickers: Vec<String>,
}

impl ConstituentSet {
    pub fn new<I, S>(tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let tickers = tickers
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| seen.insert(t.clone()))
            .collect();
        Self { tickers }
    }

    /// Builds a set from raw holding identifiers, dropping blanks and the fund itself.
    pub fn from_holdings<I, S>(fund_code: &str, raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let own_code = normalize_ticker(fund_code);
        Self::new(
            raw.into_iter()
                .map(|r| normalize_ticker(r.as_ref()))
                .filter(|t| !t.is_empty() && *t != own_code),
        )
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.iter().any(|t| t == ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.tickers.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tickers
    }
}

impl From<Vec<String>> for ConstituentSet {
    fn from(tickers: Vec<String>) -> Self {
        Self::new(tickers)
    }
}

impl From<ConstituentSet> for Vec<String> {
    fn from(set: ConstituentSet) -> Self {
        set.tickers
    }
}

/// One strategy for obtaining a fund's holdings.
#[async_trait]
pub trait HoldingsSource: Send + Sync {
    fn name(&self) -> &str;

    /// False for sources that only publish an excerpt, such as the largest
    /// holdings. Their lists are never taken as the whole composition.
    fn is_complete(&self) -> bool {
        true
    }

    /// Raw holding identifiers of `fund_code` as of `date`.
    ///
    /// An empty list means the source has nothing for that day.
    async fn holdings(&self, fund_code: &str, date: NaiveDate) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_prefix_and_suffix() {
        assert_eq!(normalize_ticker("005930"), "005930");
        assert_eq!(normalize_ticker("A005930"), "005930");
        assert_eq!(normalize_ticker(" 000660.KS "), "000660");
        assert_eq!(normalize_ticker("KR7069500007"), "500007");
        assert_eq!(normalize_ticker(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["005930", "A005930", "035420.KQ", "KR7005930003", "x", " 373220 "] {
            let once = normalize_ticker(raw);
            assert_eq!(normalize_ticker(&once), once, "input {raw:?}");
        }
        for raw in ["A005930", "005930.KS", "KR7005930003", "Q500001"] {
            assert_eq!(normalize_ticker(raw).chars().count(), TICKER_LEN);
        }
    }

    #[test]
    fn test_from_holdings_excludes_self_and_duplicates() {
        let set = ConstituentSet::from_holdings(
            "069500",
            ["A005930", "000660", "005930", "069500", "  ", "A069500"],
        );
        assert_eq!(set.as_slice(), ["005930", "000660"]);
        assert!(set.contains("000660"));
        assert!(!set.contains("069500"));
    }

    #[test]
    fn test_serde_keeps_order_and_dedupes() {
        let set: ConstituentSet = serde_json::from_str(r#"["b", "a", "b"]"#).unwrap();
        assert_eq!(set.as_slice(), ["b", "a"]);
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["b","a"]"#);
    }
}
