//! Same-day constituent metrics and the ranked views built from them

use crate::core::holdings::ConstituentSet;
use crate::core::market::{InvestorType, MarketDataSource, SubMarket};
use crate::core::model::TickerMetric;
use crate::names::NameResolver;
use chrono::NaiveDate;
use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const TOP_MOVERS: usize = 5;
pub const TOP_FLOWS: usize = 3;
pub const TOP_WEIGHTS: usize = 10;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percent change of the last close against the one before it.
///
/// Zero when fewer than two closes exist or the previous close is zero.
pub fn change_rate(closes: &[f64]) -> f64 {
    let [.., prev, close] = closes else {
        return 0.0;
    };
    if *prev == 0.0 || !prev.is_finite() || !close.is_finite() {
        return 0.0;
    }
    round2((close - prev) / prev * 100.0)
}

// Weights are handed out in hundredths of a percent
const WEIGHT_UNITS: u128 = 10_000;

/// Sets each weight to its share of the summed market cap, in percent with
/// two decimals.
///
/// Largest-remainder rounding keeps the weights summing to exactly 100 when
/// any cap is known. Equal remainders favour earlier constituents.
pub fn apply_weights(metrics: &mut [TickerMetric]) {
    let total: u128 = metrics.iter().map(|m| u128::from(m.market_cap)).sum();
    if total == 0 {
        metrics.iter_mut().for_each(|m| m.weight = 0.0);
        return;
    }

    let shares: Vec<(u128, u128)> = metrics
        .iter()
        .map(|m| {
            let scaled = u128::from(m.market_cap) * WEIGHT_UNITS;
            (scaled / total, scaled % total)
        })
        .collect();
    let mut units: Vec<u128> = shares.iter().map(|(floor, _)| *floor).collect();

    let leftover = WEIGHT_UNITS - units.iter().sum::<u128>();
    let mut by_remainder: Vec<usize> = (0..shares.len()).collect();
    by_remainder.sort_by(|a, b| shares[*b].1.cmp(&shares[*a].1));
    for &i in by_remainder.iter().take(leftover as usize) {
        units[i] += 1;
    }

    for (metric, units) in metrics.iter_mut().zip(units) {
        metric.weight = units as f64 / 100.0;
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Ascending,
    Descending,
}

/// First `n` records by `key`. Ties keep their input order.
fn top_by<K, F>(
    metrics: &[TickerMetric],
    n: usize,
    direction: Direction,
    key: F,
) -> Vec<TickerMetric>
where
    K: PartialOrd,
    F: Fn(&TickerMetric) -> K,
{
    let mut ranked: Vec<&TickerMetric> = metrics.iter().collect();
    ranked.sort_by(|a, b| {
        let ord = key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
    ranked.into_iter().take(n).cloned().collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rankings {
    pub gainers: Vec<TickerMetric>,
    pub losers: Vec<TickerMetric>,
    pub foreign_buys: Vec<TickerMetric>,
    pub inst_buys: Vec<TickerMetric>,
    pub top_weights: Vec<TickerMetric>,
}

pub fn rank(metrics: &[TickerMetric]) -> Rankings {
    Rankings {
        gainers: top_by(metrics, TOP_MOVERS, Direction::Descending, |m| m.change_rate),
        losers: top_by(metrics, TOP_MOVERS, Direction::Ascending, |m| m.change_rate),
        foreign_buys: top_by(metrics, TOP_FLOWS, Direction::Descending, |m| m.net_foreign),
        inst_buys: top_by(metrics, TOP_FLOWS, Direction::Descending, |m| m.net_institutional),
        top_weights: top_by(metrics, TOP_WEIGHTS, Direction::Descending, |m| m.weight),
    }
}

/// Joins the bulk market queries into one metric per constituent.
///
/// A failed query only zeroes the fields it would have filled.
pub struct MetricsAggregator {
    source: Arc<dyn MarketDataSource>,
}

impl MetricsAggregator {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self { source }
    }

    /// Metrics in constituent order.
    pub async fn aggregate(
        &self,
        day: NaiveDate,
        constituents: &ConstituentSet,
        names: &NameResolver,
    ) -> Vec<TickerMetric> {
        let tickers = constituents.as_slice();

        let series = self
            .source
            .price_series(tickers, day)
            .await
            .unwrap_or_else(|e| {
                debug!(%day, error = %e, "Price series unavailable");
                HashMap::new()
            });
        let caps = self
            .source
            .market_caps(tickers, day)
            .await
            .unwrap_or_else(|e| {
                debug!(%day, error = %e, "Market caps unavailable");
                HashMap::new()
            });
        let flows = self.net_flows(day).await;

        let mut metrics = Vec::with_capacity(tickers.len());
        for code in tickers {
            let name = names.name(code).await;
            let net = |investor: InvestorType| {
                flows
                    .get(&investor)
                    .and_then(|by_ticker| by_ticker.get(code))
                    .copied()
                    .unwrap_or(0)
            };
            metrics.push(TickerMetric {
                change_rate: series.get(code).map_or(0.0, |s| change_rate(s)),
                net_foreign: net(InvestorType::Foreign),
                net_institutional: net(InvestorType::Institutional),
                market_cap: caps.get(code).copied().unwrap_or(0),
                ..TickerMetric::empty(code, &name)
            });
        }

        apply_weights(&mut metrics);
        metrics
    }

    /// Net purchases per investor class, summed over the sub-markets.
    async fn net_flows(&self, day: NaiveDate) -> HashMap<InvestorType, HashMap<String, i64>> {
        let queries: Vec<(InvestorType, SubMarket)> = InvestorType::ALL
            .iter()
            .flat_map(|&investor| SubMarket::ALL.iter().map(move |&market| (investor, market)))
            .collect();
        let results = join_all(
            queries
                .iter()
                .map(|&(investor, market)| self.source.net_buys(day, investor, market)),
        )
        .await;

        let mut flows: HashMap<InvestorType, HashMap<String, i64>> = HashMap::new();
        for ((investor, market), result) in queries.into_iter().zip(results) {
            match result {
                Ok(by_ticker) => {
                    let merged = flows.entry(investor).or_default();
                    for (ticker, amount) in by_ticker {
                        let total = merged.entry(ticker).or_insert(0);
                        *total = total.saturating_add(amount);
                    }
                }
                Err(e) => {
                    debug!(%day, %investor, %market, error = %e, "Net purchases unavailable");
                }
            }
        }
        flows
    }

    /// Fund NAV deviation, `0.0` when unavailable.
    pub async fn nav_deviation(&self, fund_code: &str, day: NaiveDate) -> f64 {
        match self.source.nav_deviation(fund_code, day).await {
            Ok(deviation) if deviation.is_finite() => deviation,
            Ok(_) => 0.0,
            Err(e) => {
                debug!(fund = fund_code, %day, error = %e, "NAV deviation unavailable");
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use crate::test_support::FakeMarket;

    fn metric(code: &str, change_rate: f64) -> TickerMetric {
        TickerMetric {
            change_rate,
            ..TickerMetric::empty(code, code)
        }
    }

    fn codes(metrics: &[TickerMetric]) -> Vec<&str> {
        metrics.iter().map(|m| m.code.as_str()).collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap()
    }

    #[test]
    fn test_change_rate() {
        assert_eq!(change_rate(&[100.0, 103.456]), 3.46);
        assert_eq!(change_rate(&[90.0, 100.0, 95.0]), -5.0);
        assert_eq!(change_rate(&[100.0]), 0.0);
        assert_eq!(change_rate(&[]), 0.0);
        assert_eq!(change_rate(&[0.0, 100.0]), 0.0);
    }

    #[test]
    fn test_weights() {
        let mut metrics: Vec<TickerMetric> = [100, 300, 0]
            .iter()
            .enumerate()
            .map(|(i, cap)| TickerMetric {
                market_cap: *cap,
                ..TickerMetric::empty(&i.to_string(), "")
            })
            .collect();
        apply_weights(&mut metrics);

        let weights: Vec<f64> = metrics.iter().map(|m| m.weight).collect();
        assert_eq!(weights, vec![25.0, 75.0, 0.0]);
        assert_eq!(weights.iter().sum::<f64>(), 100.0);
    }

    #[test]
    fn test_uneven_weights_sum_to_hundred() {
        let mut metrics: Vec<TickerMetric> = (0..6)
            .map(|i| TickerMetric {
                market_cap: 7,
                ..TickerMetric::empty(&i.to_string(), "")
            })
            .collect();
        apply_weights(&mut metrics);

        let weights: Vec<f64> = metrics.iter().map(|m| m.weight).collect();
        assert_eq!(weights, vec![16.67, 16.67, 16.67, 16.67, 16.66, 16.66]);
        let units: i64 = weights.iter().map(|w| (w * 100.0).round() as i64).sum();
        assert_eq!(units, 10_000);

        let mut metrics: Vec<TickerMetric> = [1, 1, 1, 0]
            .iter()
            .map(|cap| TickerMetric {
                market_cap: *cap,
                ..TickerMetric::empty("x", "")
            })
            .collect();
        apply_weights(&mut metrics);
        let weights: Vec<f64> = metrics.iter().map(|m| m.weight).collect();
        assert_eq!(weights, vec![33.34, 33.33, 33.33, 0.0]);
    }

    #[test]
    fn test_weights_with_zero_total() {
        let mut metrics = vec![metric("a", 0.0), metric("b", 0.0)];
        metrics[0].weight = 50.0;
        apply_weights(&mut metrics);
        assert!(metrics.iter().all(|m| m.weight == 0.0));
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let metrics = vec![
            metric("a", 1.0),
            metric("b", 2.0),
            metric("c", 1.0),
            metric("d", 2.0),
            metric("e", 1.0),
            metric("f", 1.0),
        ];
        let rankings = rank(&metrics);

        assert_eq!(codes(&rankings.gainers), vec!["b", "d", "a", "c", "e"]);
        assert_eq!(codes(&rankings.losers), vec!["a", "c", "e", "f", "b"]);
    }

    #[test]
    fn test_rank_caps_lengths() {
        let metrics: Vec<TickerMetric> = (0..12)
            .map(|i| TickerMetric {
                net_foreign: i,
                net_institutional: -i,
                weight: i as f64,
                ..metric(&format!("{i:06}"), 0.0)
            })
            .collect();
        let rankings = rank(&metrics);

        assert_eq!(rankings.gainers.len(), TOP_MOVERS);
        assert_eq!(rankings.losers.len(), TOP_MOVERS);
        assert_eq!(codes(&rankings.foreign_buys), vec!["000011", "000010", "000009"]);
        assert_eq!(codes(&rankings.inst_buys), vec!["000000", "000001", "000002"]);
        assert_eq!(rankings.top_weights.len(), TOP_WEIGHTS);
        assert_eq!(rankings.top_weights[0].code, "000011");
    }

    #[test]
    fn test_rank_empty() {
        assert_eq!(rank(&[]), Rankings::default());
    }

    #[tokio::test]
    async fn test_aggregate_joins_sources() {
        let market = Arc::new(
            FakeMarket::default()
                .name("005930", "삼성전자")
                .closes("005930", &[78000.0, 77400.0])
                .closes("000660", &[200000.0, 210000.0])
                .cap("005930", 300)
                .cap("000660", 100)
                .flow(InvestorType::Foreign, SubMarket::Kospi, "005930", 1_000)
                .flow(InvestorType::Foreign, SubMarket::Kosdaq, "005930", 500)
                .flow(InvestorType::Institutional, SubMarket::Kospi, "000660", -2_000),
        );
        let source = Arc::clone(&market) as Arc<dyn MarketDataSource>;
        let names = NameResolver::new(Arc::clone(&source), Arc::new(MemoryCollection::new()));
        let aggregator = MetricsAggregator::new(source);

        let set = ConstituentSet::new(["005930", "000660", "373220"]);
        let metrics = aggregator.aggregate(day(), &set, &names).await;

        assert_eq!(codes(&metrics), vec!["005930", "000660", "373220"]);
        assert_eq!(metrics[0].name, "삼성전자");
        assert_eq!(metrics[0].change_rate, -0.77);
        assert_eq!(metrics[0].net_foreign, 1_500);
        assert_eq!(metrics[0].weight, 75.0);
        assert_eq!(metrics[1].name, "000660");
        assert_eq!(metrics[1].change_rate, 5.0);
        assert_eq!(metrics[1].net_institutional, -2_000);
        assert_eq!(metrics[1].weight, 25.0);
        assert_eq!(metrics[2], TickerMetric::empty("373220", "373220"));
    }

    #[tokio::test]
    async fn test_aggregate_survives_failing_source() {
        let source: Arc<dyn MarketDataSource> = Arc::new(FakeMarket::default().failing());
        let names = NameResolver::new(Arc::clone(&source), Arc::new(MemoryCollection::new()));
        let aggregator = MetricsAggregator::new(source);

        let set = ConstituentSet::new(["x", "y"]);
        let metrics = aggregator.aggregate(day(), &set, &names).await;
        assert_eq!(
            metrics,
            vec![TickerMetric::empty("x", "x"), TickerMetric::empty("y", "y")]
        );
        assert_eq!(aggregator.nav_deviation("069500", day()).await, 0.0);
    }

    #[tokio::test]
    async fn test_nav_deviation() {
        let aggregator = MetricsAggregator::new(Arc::new(FakeMarket::default().deviation(-0.12)));
        assert_eq!(aggregator.nav_deviation("069500", day()).await, -0.12);
    }
}
