//! One tracking run: resolve the business day, then fetch, diff and measure
//! every enabled fund before notifying once and persisting.

use crate::calendar::BusinessDayResolver;
use crate::changes::{FundChange, describe, diff, format_message};
use crate::constituents::ConstituentFetcher;
use crate::core::cache::Store;
use crate::core::config::{AppConfig, FundConfig};
use crate::core::model::{ChangeRecord, DashboardSnapshot, FundDashboard, HistoryState};
use crate::core::notify::Notifier;
use crate::metrics::{MetricsAggregator, rank};
use crate::names::NameResolver;
use crate::providers::{self, ProviderSet, telegram::notifier_from_config};
use crate::store::KeyValueStore;
use crate::store::snapshot::{JsonFileStore, SnapshotStore};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const NAMES_COLLECTION: &str = "ticker_names";

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Print the message instead of sending it and leave the files untouched.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub business_day: NaiveDate,
    pub processed: usize,
    /// Funds without any constituent source, in config order.
    pub skipped: Vec<String>,
    pub changed: Vec<String>,
    pub notified: bool,
}

/// State threaded through the fund loop.
struct RunContext {
    history: HistoryState,
    dashboard: DashboardSnapshot,
    changes: Vec<FundChange>,
    processed: usize,
    skipped: Vec<String>,
}

impl RunContext {
    fn new(history: HistoryState, business_day: NaiveDate) -> Self {
        let last_updated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            history,
            dashboard: DashboardSnapshot::new(last_updated, business_day),
            changes: Vec::new(),
            processed: 0,
            skipped: Vec::new(),
        }
    }
}

pub struct Tracker {
    resolver: BusinessDayResolver,
    fetcher: ConstituentFetcher,
    aggregator: MetricsAggregator,
    names: NameResolver,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn SnapshotStore>,
    cache: KeyValueStore,
}

impl Tracker {
    pub fn new(
        providers: ProviderSet,
        cache: KeyValueStore,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn SnapshotStore>,
        lookback_days: usize,
        fallbacks: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let names = NameResolver::new(
            Arc::clone(&providers.market),
            cache.get_collection(NAMES_COLLECTION, true),
        );
        Self {
            resolver: BusinessDayResolver::new(Arc::clone(&providers.market), lookback_days),
            fetcher: ConstituentFetcher::new(providers.holdings, lookback_days)
                .with_fallbacks(fallbacks),
            aggregator: MetricsAggregator::new(providers.market),
            names,
            notifier,
            store,
            cache,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.providers.timeout_secs);
        Ok(Self::new(
            providers::build(config)?,
            KeyValueStore::open(&config.cache_dir()?),
            notifier_from_config(&config.telegram, timeout)?,
            Arc::new(JsonFileStore::new(
                config.history_file()?,
                config.dashboard_file()?,
            )),
            config.lookback_days,
            &config.fallbacks,
        ))
    }

    pub fn resolver(&self) -> &BusinessDayResolver {
        &self.resolver
    }

    pub fn fetcher(&self) -> &ConstituentFetcher {
        &self.fetcher
    }

    pub async fn run(&self, funds: &[FundConfig], options: RunOptions) -> Result<RunReport> {
        let business_day = self.resolver.resolve().await;
        self.run_for_day(business_day, funds, options).await
    }

    /// Processes `funds` in order for a known business day.
    ///
    /// Only failing to read or write the persisted files is an error.
    pub async fn run_for_day(
        &self,
        business_day: NaiveDate,
        funds: &[FundConfig],
        options: RunOptions,
    ) -> Result<RunReport> {
        let history = self.store.load_history()?;
        let mut ctx = RunContext::new(history, business_day);

        for fund in funds {
            info!(fund = %fund.code, name = %fund.name, "Processing ETF");
            self.process_fund(fund, business_day, &mut ctx).await;
        }

        let notified = self.notify(business_day, &ctx.changes, options).await;

        if options.dry_run {
            info!("Dry run, leaving history and dashboard untouched");
        } else {
            self.store.save_history(&ctx.history)?;
            self.store.save_dashboard(&ctx.dashboard)?;
        }
        self.cache.persist();

        Ok(RunReport {
            business_day,
            processed: ctx.processed,
            skipped: ctx.skipped,
            changed: ctx.changes.into_iter().map(|c| c.code).collect(),
            notified,
        })
    }

    async fn process_fund(
        &self,
        fund: &FundConfig,
        business_day: NaiveDate,
        ctx: &mut RunContext,
    ) {
        let Some(fetched) = self.fetcher.fetch(&fund.code, business_day).await else {
            warn!(fund = %fund.code, "No constituents found in the recent days, skipping");
            ctx.skipped.push(fund.code.clone());
            return;
        };
        let current = fetched.constituents;
        let stale = !fetched.origin.is_authoritative();

        let recent_changes = if stale {
            warn!(
                fund = %fund.code,
                source = fetched.origin.source(),
                "Constituents are a stand-in, keeping history and skipping change detection"
            );
            ChangeRecord::default()
        } else {
            let previous = ctx
                .history
                .insert(fund.code.clone(), current.clone())
                .unwrap_or_default();
            describe(&diff(&previous, &current), &self.names).await
        };

        if recent_changes.is_empty() {
            info!(fund = %fund.code, "No changes");
        } else {
            info!(
                fund = %fund.code,
                added = recent_changes.added.len(),
                removed = recent_changes.removed.len(),
                "Constituents changed"
            );
            ctx.changes.push(FundChange {
                code: fund.code.clone(),
                name: fund.name.clone(),
                record: recent_changes.clone(),
            });
        }

        let constituents = self
            .aggregator
            .aggregate(business_day, &current, &self.names)
            .await;
        let deviation = self.aggregator.nav_deviation(&fund.code, business_day).await;
        let rankings = rank(&constituents);

        ctx.dashboard.etfs.insert(
            fund.code.clone(),
            FundDashboard {
                name: fund.name.clone(),
                code: fund.code.clone(),
                total_constituents: current.len(),
                source: fetched.origin.source().to_string(),
                stale,
                deviation,
                recent_changes,
                gainers: rankings.gainers,
                losers: rankings.losers,
                foreign_buys: rankings.foreign_buys,
                inst_buys: rankings.inst_buys,
                top_weights: rankings.top_weights,
                constituents,
            },
        );
        ctx.processed += 1;
    }

    /// Sends one message covering every changed fund. Delivery failures are
    /// logged and reported as not notified.
    async fn notify(
        &self,
        business_day: NaiveDate,
        changes: &[FundChange],
        options: RunOptions,
    ) -> bool {
        if changes.is_empty() {
            info!("No ETF constituent changes detected");
            return false;
        }

        let message = format_message(business_day, changes);
        if options.dry_run {
            println!("{message}");
            return false;
        }

        info!(funds = changes.len(), "Changes detected, sending notification");
        match self.notifier.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to send notification");
                false
            }
        }
    }
}
