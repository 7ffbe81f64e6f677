//! Core types: currency pairs, daily rate records and date ranges

use crate::error::{ForexError, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered pair of currency codes identifying one rate series (e.g. GBP -> INR)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    /// Create a pair, normalising both codes to trimmed upper case.
    ///
    /// Codes are not checked against any currency list.
    pub fn new(from: &str, to: &str) -> Result<Self> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from.is_empty() || to.is_empty() {
            return Err(ForexError::InvalidRequest(format!(
                "Currency pair needs two codes, got '{}' and '{}'",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Upstream chart symbol, e.g. `GBPINR=X`
    pub fn symbol(&self) -> String {
        format!("{}{}=X", self.from, self.to)
    }
}

impl FromStr for CurrencyPair {
    type Err = ForexError;

    /// Accepts `GBP/INR`, `GBP-INR` or `GBPINR`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((from, to)) = s.split_once(['/', '-']) {
            return Self::new(from, to);
        }
        if s.len() == 6 && s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Self::new(&s[..3], &s[3..]);
        }
        Err(ForexError::InvalidRequest(format!(
            "Cannot parse currency pair: '{}'",
            s
        )))
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// Daily OHLCV summary for one pair on one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl RateRecord {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Get price range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Closed interval of calendar days, `start <= end` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = ForexError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

/// One maximal run of days inside a requested range that has no stored record
pub type MissingRange = DateRange;

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ForexError::InvalidRequest(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Caller guarantees `start <= end`
    pub(crate) fn from_ordered(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Single-day range
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, both ends included
    pub fn len_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day in the range, ascending
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |d| {
            let next = *d + Duration::days(1);
            (next <= end).then_some(next)
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_pair_parsing() {
        let pair: CurrencyPair = "gbp/inr".parse().unwrap();
        assert_eq!(pair.from, "GBP");
        assert_eq!(pair.to, "INR");
        assert_eq!("AED-INR".parse::<CurrencyPair>().unwrap().to_string(), "AED/INR");
        assert_eq!("usdeur".parse::<CurrencyPair>().unwrap().symbol(), "USDEUR=X");
        assert!("USD".parse::<CurrencyPair>().is_err());
        assert!(CurrencyPair::new(" ", "EUR").is_err());
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert!(DateRange::new(d(2024, 1, 2), d(2024, 1, 1)).is_err());
        assert!(DateRange::new(d(2024, 1, 1), d(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_range_days() {
        let range = DateRange::new(d(2024, 2, 27), d(2024, 3, 2)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(range.len_days(), 5);
        assert_eq!(days.len(), 5);
        assert_eq!(days[2], d(2024, 2, 29));
        assert!(range.contains(d(2024, 3, 2)));
        assert!(!range.contains(d(2024, 3, 3)));
        assert_eq!(DateRange::day(d(2024, 1, 1)).days().count(), 1);
    }

    #[test]
    fn test_range_deserialize_checks_bounds() {
        let range: DateRange =
            serde_json::from_str(r#"{"start":"2024-01-01","end":"2024-01-03"}"#).unwrap();
        assert_eq!(range.len_days(), 3);
        assert!(serde_json::from_str::<DateRange>(r#"{"start":"2024-01-03","end":"2024-01-01"}"#).is_err());
    }

    #[test]
    fn test_record_range() {
        let record = RateRecord::new(d(2024, 1, 1), 1.0, 1.2, 0.9, 1.1, 0);
        assert!((record.range() - 0.3).abs() < 1e-12);
    }
}
