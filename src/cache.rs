//! Gap-filling rate cache
//!
//! `ForexCache` resolves a request to a date range, asks the store which days
//! are already known, fetches only the missing runs from the upstream source,
//! upserts them, and answers from the store.

use crate::data::gaps::{find_missing, missing_day_count};
use crate::data::sources::RateSource;
use crate::data::store::RateStore;
use crate::error::{FetchError, ForexError, Result};
use crate::period::{Clock, RangeRequest, SystemClock};
use crate::types::{CurrencyPair, DateRange, MissingRange, RateRecord};
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A gap whose upstream fetch failed
#[derive(Debug, Clone, PartialEq)]
pub struct GapFailure {
    pub range: MissingRange,
    pub error: FetchError,
}

/// Answer to a `get_range` call
#[derive(Debug, Clone)]
pub struct RangeResult {
    pub pair: CurrencyPair,
    pub range: DateRange,
    /// Everything durably stored for the range, ascending by date
    pub records: Vec<RateRecord>,
    /// Gaps that could not be filled; non-empty means the series may be incomplete
    pub failures: Vec<GapFailure>,
    /// Number of gaps sent upstream
    pub fetched_gaps: usize,
}

impl RangeResult {
    /// No gap fetch failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Days in the range without a stored record
    pub fn missing_days(&self) -> Vec<NaiveDate> {
        let have: BTreeSet<NaiveDate> = self.records.iter().map(|r| r.date).collect();
        self.range.days().filter(|d| !have.contains(d)).collect()
    }
}

/// Gap-filling cache over a rate store and an upstream source
pub struct ForexCache<S: RateSource> {
    store: RateStore,
    source: S,
    tz: Tz,
    clock: Arc<dyn Clock>,
    mark_empty_days: bool,
}

impl<S: RateSource> ForexCache<S> {
    pub fn new(store: RateStore, source: S, tz: Tz) -> Self {
        Self {
            store,
            source,
            tz,
            clock: Arc::new(SystemClock),
            mark_empty_days: true,
        }
    }

    /// Replace the clock used to resolve periods
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether days the upstream had nothing for are remembered
    pub fn with_mark_empty_days(mut self, enabled: bool) -> Self {
        self.mark_empty_days = enabled;
        self
    }

    pub fn store(&self) -> &RateStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Today in the reference time zone
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.tz)
    }

    /// Concrete range for a request
    pub fn resolve(&self, request: &RangeRequest) -> DateRange {
        request.resolve(self.today())
    }

    /// Missing runs of `range` for `pair` according to the store
    pub fn missing_ranges(&self, pair: &CurrencyPair, range: DateRange) -> Result<Vec<MissingRange>> {
        let present = self.store.present_dates(pair, range)?;
        Ok(find_missing(range, &present))
    }

    /// Upsert a fetched gap on the blocking pool.
    ///
    /// A year of rows is one transaction; running it off the async workers keeps
    /// other requests moving while it commits. Reads stay inline, they are small.
    async fn store_records(&self, pair: &CurrencyPair, records: Vec<RateRecord>) -> Result<usize> {
        let store = self.store.clone();
        let pair = pair.clone();
        tokio::task::spawn_blocking(move || store.upsert(&pair, &records))
            .await
            .map_err(|e| ForexError::Storage(format!("Upsert task failed: {}", e)))?
    }

    /// Complete series for `pair` over the requested range, filling gaps first.
    ///
    /// Storage failures abort the call. Fetch failures are collected per gap in
    /// `RangeResult::failures` and the remaining gaps are still filled.
    pub async fn get_range(&self, pair: &CurrencyPair, request: &RangeRequest) -> Result<RangeResult> {
        let range = self.resolve(request);
        let gaps = self.missing_ranges(pair, range)?;

        if !gaps.is_empty() {
            log::info!(
                "{} {}: {} gap(s), {} day(s) missing",
                pair,
                range,
                gaps.len(),
                missing_day_count(&gaps)
            );
            log::debug!("Gaps for {}: {:?}", pair, gaps);
        }

        let today = self.today();
        let mut failures = Vec::new();

        for gap in &gaps {
            match self.source.fetch(pair, *gap).await {
                Ok(records) => {
                    let returned: BTreeSet<NaiveDate> = records.iter().map(|r| r.date).collect();
                    let written = self.store_records(pair, records).await?;
                    log::info!(
                        "Filled {} {} from {}: {} record(s)",
                        pair,
                        gap,
                        self.source.name(),
                        written
                    );
                    if self.mark_empty_days {
                        let empty: Vec<NaiveDate> = gap
                            .days()
                            .filter(|d| *d < today && !returned.contains(d))
                            .collect();
                        self.store.mark_empty_days(pair, &empty)?;
                    }
                }
                Err(error) => {
                    if self.mark_empty_days && error.is_no_data() {
                        let empty: Vec<NaiveDate> = gap.days().filter(|d| *d < today).collect();
                        self.store.mark_empty_days(pair, &empty)?;
                    }
                    log::warn!("Failed to fill {} {}: {}", pair, gap, error);
                    failures.push(GapFailure { range: *gap, error });
                }
            }
        }

        let records = self.store.read_range(pair, range)?;

        Ok(RangeResult {
            pair: pair.clone(),
            range,
            records,
            failures,
            fetched_gaps: gaps.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::{FixedClock, Period};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Serves a fixed set of records, recording every request
    struct StaticSource {
        records: Vec<RateRecord>,
        calls: Mutex<Vec<DateRange>>,
    }

    impl RateSource for StaticSource {
        async fn fetch(
            &self,
            pair: &CurrencyPair,
            range: DateRange,
        ) -> std::result::Result<Vec<RateRecord>, FetchError> {
            self.calls.lock().unwrap().push(range);
            let rows: Vec<_> = self
                .records
                .iter()
                .filter(|r| range.contains(r.date))
                .cloned()
                .collect();
            if rows.is_empty() {
                return Err(FetchError::NoDataAvailable {
                    symbol: pair.symbol(),
                    start: range.start(),
                    end: range.end(),
                });
            }
            Ok(rows)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn record(date: NaiveDate, close: f64) -> RateRecord {
        RateRecord::new(date, close, close, close, close, 0)
    }

    fn cache_with(records: Vec<RateRecord>) -> ForexCache<StaticSource> {
        let source = StaticSource {
            records,
            calls: Mutex::new(Vec::new()),
        };
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        ForexCache::new(RateStore::open_in_memory().unwrap(), source, chrono_tz::UTC)
            .with_clock(Arc::new(clock))
    }

    #[tokio::test]
    async fn test_resolve_period_uses_clock() {
        let cache = cache_with(vec![]);
        let range = cache.resolve(&RangeRequest::Period(Period::OneWeek));
        assert_eq!(range.end(), d(3, 1));
        assert_eq!(range.start(), d(2, 23));
    }

    #[tokio::test]
    async fn test_cold_fetch_then_cached() {
        let records: Vec<_> = (1..=7).map(|day| record(d(1, day), day as f64)).collect();
        let cache = cache_with(records);
        let pair = CurrencyPair::new("GBP", "INR").unwrap();
        let request = RangeRequest::Explicit(DateRange::new(d(1, 1), d(1, 7)).unwrap());

        let first = cache.get_range(&pair, &request).await.unwrap();
        assert_eq!(first.records.len(), 7);
        assert_eq!(first.fetched_gaps, 1);
        assert!(first.is_complete());

        let second = cache.get_range(&pair, &request).await.unwrap();
        assert_eq!(second.fetched_gaps, 0);
        assert_eq!(second.records, first.records);
        assert_eq!(cache.source().calls.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_large_gap_is_stored_off_the_async_workers() {
        let year = DateRange::new(d(1, 1), d(12, 31)).unwrap();
        let records: Vec<_> = year.days().map(|day| record(day, 1.5)).collect();
        let cache = cache_with(records);
        let pair = CurrencyPair::new("GBP", "INR").unwrap();

        let result = cache.get_range(&pair, &RangeRequest::Explicit(year)).await.unwrap();
        assert_eq!(result.records.len(), 366);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_the_request() {
        let mut bad = record(d(1, 2), 1.0);
        bad.volume = u64::MAX;
        let cache = cache_with(vec![record(d(1, 1), 1.0), bad]);
        let pair = CurrencyPair::new("GBP", "INR").unwrap();

        let request = RangeRequest::Explicit(DateRange::new(d(1, 1), d(1, 2)).unwrap());
        let result = cache.get_range(&pair, &request).await;
        assert!(matches!(result, Err(ForexError::Storage(_))));
        assert!(cache
            .store()
            .read_range(&pair, DateRange::new(d(1, 1), d(1, 2)).unwrap())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_no_data_gap_is_reported_and_remembered() {
        let cache = cache_with(vec![record(d(1, 1), 1.0)]);
        let pair = CurrencyPair::new("GBP", "INR").unwrap();
        cache.get_range(&pair, &RangeRequest::Explicit(DateRange::day(d(1, 1)))).await.unwrap();

        let request = RangeRequest::Explicit(DateRange::new(d(1, 1), d(1, 3)).unwrap());
        let result = cache.get_range(&pair, &request).await.unwrap();
        assert!(!result.is_complete());
        assert!(result.failures[0].error.is_no_data());
        assert_eq!(result.missing_days(), vec![d(1, 2), d(1, 3)]);

        // 01-02 and 01-03 are now known to have no data
        let again = cache.get_range(&pair, &request).await.unwrap();
        assert_eq!(again.fetched_gaps, 0);
        assert!(again.is_complete());
    }
}
