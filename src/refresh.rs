//! Recurring background refresh
//!
//! Walks a fixed list of (pair, period) combinations through the same
//! `ForexCache::get_range` path interactive callers use.

use crate::cache::ForexCache;
use crate::config::RefreshConfig;
use crate::data::sources::RateSource;
use crate::error::Result;
use crate::period::{Period, RangeRequest};
use crate::types::CurrencyPair;
use hashbrown::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What to refresh and how often
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    pub pairs: Vec<CurrencyPair>,
    pub periods: Vec<Period>,
    pub interval: Duration,
}

impl RefreshSchedule {
    pub fn from_config(config: &RefreshConfig) -> Result<Self> {
        Ok(Self {
            pairs: config.parsed_pairs()?,
            periods: config.parsed_periods()?,
            interval: config.interval(),
        })
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    /// (pair, period) combinations walked
    pub combinations: usize,
    /// Gaps sent upstream across all combinations
    pub gaps_fetched: usize,
    /// Gaps whose fetch failed
    pub gap_failures: usize,
    /// Combinations that failed outright (storage errors)
    pub errors: usize,
    /// Rows held per pair after the cycle, from the widest period
    pub rows_by_pair: HashMap<CurrencyPair, usize>,
}

impl RefreshSummary {
    pub fn is_clean(&self) -> bool {
        self.gap_failures == 0 && self.errors == 0
    }
}

/// Run every (pair, period) combination once, sequentially.
///
/// Failures are logged and counted; they never stop the cycle.
pub async fn run_once<S: RateSource>(cache: &ForexCache<S>, schedule: &RefreshSchedule) -> RefreshSummary {
    let mut summary = RefreshSummary::default();
    log::info!(
        "Refreshing {} pair(s) over {} period(s)",
        schedule.pairs.len(),
        schedule.periods.len()
    );

    for pair in &schedule.pairs {
        for period in &schedule.periods {
            summary.combinations += 1;
            match cache.get_range(pair, &RangeRequest::Period(*period)).await {
                Ok(result) => {
                    summary.gaps_fetched += result.fetched_gaps;
                    summary.gap_failures += result.failures.len();
                    let rows = summary.rows_by_pair.entry(pair.clone()).or_insert(0);
                    *rows = (*rows).max(result.records.len());
                }
                Err(e) => {
                    summary.errors += 1;
                    log::error!("Refresh of {} {} failed: {}", pair, period, e);
                }
            }
        }
    }

    log::info!(
        "Refresh done: {} gap(s) fetched, {} failed, {} error(s)",
        summary.gaps_fetched,
        summary.gap_failures,
        summary.errors
    );
    summary
}

/// Handle to a running refresh task
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Signal the task to stop and wait for it.
    ///
    /// A cycle already in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            log::error!("Refresh task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Recurring refresh driver
pub struct RefreshTask;

impl RefreshTask {
    /// Spawn the refresh loop on the current tokio runtime.
    ///
    /// The first cycle runs immediately, then once per `schedule.interval`.
    pub fn spawn<S>(cache: Arc<ForexCache<S>>, schedule: RefreshSchedule) -> RefreshHandle
    where
        S: RateSource + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(schedule.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(cache.as_ref(), &schedule).await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Refresh task stopped");
        });

        RefreshHandle { stop, task }
    }
}
