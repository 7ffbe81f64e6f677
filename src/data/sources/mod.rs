//! Upstream rate sources
//!
//! - Yahoo Finance chart API: free daily OHLCV history for FX pairs

pub mod yahoo;

pub use yahoo::YahooChartSource;

use crate::error::FetchError;
use crate::types::{CurrencyPair, DateRange, RateRecord};

/// Trait for upstream providers of daily rate history
pub trait RateSource: Send + Sync {
    /// Fetch daily records for `pair` over `range`.
    ///
    /// One upstream request per call. The result is sorted ascending by date,
    /// holds at most one record per day, and never holds a day outside `range`.
    fn fetch(
        &self,
        pair: &CurrencyPair,
        range: DateRange,
    ) -> impl std::future::Future<Output = Result<Vec<RateRecord>, FetchError>> + Send;

    /// Get the source name
    fn name(&self) -> &str;
}
