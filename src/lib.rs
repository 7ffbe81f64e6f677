//! # rusty-forex
//!
//! A locally cached time series of daily currency-exchange rates that fills
//! its own gaps from an upstream provider.
//!
//! A request for a pair over a period (or explicit dates) is answered from a
//! SQLite store. Only the runs of days the store does not know about are
//! fetched upstream, upserted, and the answer is re-read from the store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_forex::prelude::*;
//!
//! # async fn run() -> rusty_forex::error::Result<()> {
//! let config = Config::default();
//! let tz = config.tz()?;
//! let store = RateStore::open(&config.db_path)?;
//! let source = YahooChartSource::new(&config.upstream, tz)?;
//! let cache = ForexCache::new(store, source, tz);
//!
//! let pair: CurrencyPair = "GBP/INR".parse()?;
//! let result = cache.get_range(&pair, &RangeRequest::Period(Period::OneMonth)).await?;
//! if !result.is_complete() {
//!     eprintln!("{} gap(s) could not be filled", result.failures.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod period;
pub mod refresh;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::cache::{ForexCache, GapFailure, RangeResult};
    pub use crate::config::Config;
    pub use crate::data::{RateSource, RateStore, YahooChartSource};
    pub use crate::error::{FetchError, ForexError, Result};
    pub use crate::period::{Clock, FixedClock, Period, RangeRequest, SystemClock};
    pub use crate::refresh::{RefreshHandle, RefreshSchedule, RefreshSummary, RefreshTask};
    pub use crate::types::*;
}
