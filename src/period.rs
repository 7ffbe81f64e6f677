//! Named periods ("1W", "1M", ...) and their resolution to concrete date ranges

use crate::error::{ForexError, Result};
use crate::types::DateRange;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source of "now" for period resolution
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar day in the given time zone
    fn today(&self, tz: Tz) -> NaiveDate {
        self.now().with_timezone(&tz).date_naive()
    }
}

/// Process wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Lookback window ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
    ];

    /// Parse a period name; unknown names are rejected
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_uppercase().as_str() {
            "1W" => Ok(Period::OneWeek),
            "1M" => Ok(Period::OneMonth),
            "3M" => Ok(Period::ThreeMonths),
            "6M" => Ok(Period::SixMonths),
            "1Y" => Ok(Period::OneYear),
            other => Err(ForexError::InvalidRequest(format!(
                "Unknown period '{}', expected one of 1W, 1M, 3M, 6M, 1Y",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneWeek => "1W",
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::OneYear => "1Y",
        }
    }

    pub fn span(&self) -> Duration {
        match self {
            Period::OneWeek => Duration::weeks(1),
            Period::OneMonth => Duration::days(30),
            Period::ThreeMonths => Duration::days(90),
            Period::SixMonths => Duration::days(180),
            Period::OneYear => Duration::days(365),
        }
    }

    /// Range `[today - span, today]`
    pub fn resolve(&self, today: NaiveDate) -> DateRange {
        DateRange::from_ordered(today - self.span(), today)
    }
}

impl FromStr for Period {
    type Err = ForexError;

    fn from_str(s: &str) -> Result<Self> {
        Period::parse(s)
    }
}

impl TryFrom<String> for Period {
    type Error = ForexError;

    fn try_from(value: String) -> Result<Self> {
        Period::parse(&value)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.as_str().to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller asks for: a named period or explicit dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    Period(Period),
    Explicit(DateRange),
}

impl RangeRequest {
    /// Build a request from boundary inputs.
    ///
    /// Either a period or both dates must be given, not both.
    pub fn parse(
        period: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self> {
        match (period, start, end) {
            (Some(p), None, None) => Ok(RangeRequest::Period(Period::parse(p)?)),
            (None, Some(s), Some(e)) => {
                let start = parse_date(s)?;
                let end = parse_date(e)?;
                Ok(RangeRequest::Explicit(DateRange::new(start, end)?))
            }
            _ => Err(ForexError::InvalidRequest(
                "Specify either a period or both start and end dates".to_string(),
            )),
        }
    }

    pub fn resolve(&self, today: NaiveDate) -> DateRange {
        match self {
            RangeRequest::Period(period) => period.resolve(today),
            RangeRequest::Explicit(range) => *range,
        }
    }
}

impl From<Period> for RangeRequest {
    fn from(period: Period) -> Self {
        RangeRequest::Period(period)
    }
}

impl From<DateRange> for RangeRequest {
    fn from(range: DateRange) -> Self {
        RangeRequest::Explicit(range)
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| ForexError::InvalidRequest(format!("Invalid date '{}': {}", s, e)))
}
