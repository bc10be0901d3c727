//! Business-day resolution and the bounded backward date walk it shares
//! with constituent fetching.

use crate::core::market::MarketDataSource;
use anyhow::Result;
use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes `start`, then each preceding calendar day, at most `attempts` dates.
///
/// Returns the first date whose probe yields a value. Probe errors count as
/// a miss for that date.
pub async fn walk_back<T, F, Fut>(
    start: NaiveDate,
    attempts: usize,
    mut probe: F,
) -> Option<(NaiveDate, T)>
where
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut date = start;
    for attempt in 1..=attempts {
        match probe(date).await {
            Ok(Some(value)) => return Some((date, value)),
            Ok(None) => debug!(%date, attempt, "No data"),
            Err(e) => debug!(%date, attempt, error = %e, "Probe failed"),
        }
        date = date.pred_opt()?;
    }
    None
}

/// Latest weekday on or before `today`. Holidays are not known here.
pub fn weekday_fallback(today: NaiveDate) -> NaiveDate {
    let back = match today.weekday() {
        Weekday::Sat => 1,
        Weekday::Sun => 2,
        _ => 0,
    };
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

pub struct BusinessDayResolver {
    source: Arc<dyn MarketDataSource>,
    attempts: usize,
}

impl BusinessDayResolver {
    pub fn new(source: Arc<dyn MarketDataSource>, attempts: usize) -> Self {
        Self { source, attempts }
    }

    pub async fn resolve(&self) -> NaiveDate {
        self.resolve_from(Local::now().date_naive()).await
    }

    /// Most recent date with benchmark index data, never failing.
    ///
    /// Falls back to [`weekday_fallback`] when no probed date had data, in
    /// which case the result may still be an exchange holiday.
    pub async fn resolve_from(&self, today: NaiveDate) -> NaiveDate {
        let found = walk_back(today, self.attempts, |date| async move {
            let closes = self.source.index_closes(date).await?;
            Ok::<_, anyhow::Error>((!closes.is_empty()).then_some(()))
        })
        .await;

        match found {
            Some((day, ())) => {
                info!(business_day = %day, "Resolved business day");
                day
            }
            None => {
                let day = weekday_fallback(today);
                warn!(
                    business_day = %day,
                    attempts = self.attempts,
                    "Index data unavailable, using calendar fallback"
                );
                day
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeMarket;
    use anyhow::anyhow;
    use std::sync::atomic::Ordering;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_walk_back_stops_at_first_hit() {
        let mut probed = Vec::new();
        let found = walk_back(date(2024, 6, 10), 5, |d| {
            probed.push(d);
            async move {
                if d == date(2024, 6, 8) {
                    Ok(Some("hit"))
                } else if d == date(2024, 6, 9) {
                    Err(anyhow!("timeout"))
                } else {
                    Ok(None)
                }
            }
        })
        .await;

        assert_eq!(found, Some((date(2024, 6, 8), "hit")));
        assert_eq!(
            probed,
            vec![date(2024, 6, 10), date(2024, 6, 9), date(2024, 6, 8)]
        );
    }

    #[tokio::test]
    async fn test_walk_back_is_bounded() {
        let mut calls = 0;
        let found: Option<(NaiveDate, ())> = walk_back(date(2024, 6, 10), 4, |_| {
            calls += 1;
            async { Ok::<_, anyhow::Error>(None) }
        })
        .await;

        assert!(found.is_none());
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_weekday_fallback() {
        // 2024-06-07 is a Friday
        assert_eq!(weekday_fallback(date(2024, 6, 8)), date(2024, 6, 7));
        assert_eq!(weekday_fallback(date(2024, 6, 9)), date(2024, 6, 7));
        assert_eq!(weekday_fallback(date(2024, 6, 10)), date(2024, 6, 10));
        assert_eq!(weekday_fallback(date(2024, 6, 7)), date(2024, 6, 7));
    }

    #[tokio::test]
    async fn test_resolve_skips_weekend() {
        let market = FakeMarket::default().trading_day(date(2024, 6, 7));
        let resolver = BusinessDayResolver::new(Arc::new(market), 10);

        assert_eq!(resolver.resolve_from(date(2024, 6, 9)).await, date(2024, 6, 7));
        assert_eq!(resolver.resolve_from(date(2024, 6, 7)).await, date(2024, 6, 7));
    }

    #[tokio::test]
    async fn test_resolve_sunday_when_probe_always_fails() {
        let market = Arc::new(FakeMarket::default().failing());
        let resolver =
            BusinessDayResolver::new(Arc::clone(&market) as Arc<dyn MarketDataSource>, 10);

        let day = resolver.resolve_from(date(2024, 6, 9)).await;
        assert_eq!(day, date(2024, 6, 7));
        assert_eq!(day.weekday(), Weekday::Fri);
        assert_eq!(market.index_calls.load(Ordering::SeqCst), 10);
    }
}
