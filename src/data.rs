//! Rate data: storage, gap detection and upstream sources

pub mod gaps;
pub mod sources;
pub mod store;

pub use gaps::find_missing;
pub use sources::{RateSource, YahooChartSource};
pub use store::{Coverage, RateStore};
