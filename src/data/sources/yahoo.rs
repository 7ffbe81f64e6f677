//! Yahoo Finance chart API source
//!
//! Provides free daily OHLCV history for FX pairs (`GBPINR=X` style symbols).

use super::RateSource;
use crate::config::UpstreamConfig;
use crate::error::{FetchError, ForexError, Result};
use crate::types::{CurrencyPair, DateRange, RateRecord};
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Yahoo Finance chart source (no API key required)
pub struct YahooChartSource {
    client: Client,
    base_url: String,
    tz: Tz,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

impl YahooChartSource {
    /// Create a source; `tz` is the zone daily bars are truncated to
    pub fn new(config: &UpstreamConfig, tz: Tz) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ForexError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            tz,
        })
    }

    /// `period1`/`period2` epoch seconds for a range.
    ///
    /// `period2` is midnight after `range.end()`, so the end day is included.
    pub fn request_bounds(&self, range: DateRange) -> (i64, i64) {
        (
            day_start_epoch(range.start(), self.tz),
            day_start_epoch(range.end() + Duration::days(1), self.tz),
        )
    }

    async fn fetch_chart(
        &self,
        pair: &CurrencyPair,
        range: DateRange,
    ) -> std::result::Result<Vec<RateRecord>, FetchError> {
        let symbol = pair.symbol();
        let (period1, period2) = self.request_bounds(range);
        let url = format!("{}{}", self.base_url, symbol);

        log::debug!("GET {} period1={} period2={} for {}", url, period1, period2, range);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(classify_rejection(status.as_u16(), &body, &symbol, range));
        }

        parse_chart(&body, &symbol, range, self.tz)
    }
}

impl RateSource for YahooChartSource {
    async fn fetch(
        &self,
        pair: &CurrencyPair,
        range: DateRange,
    ) -> std::result::Result<Vec<RateRecord>, FetchError> {
        self.fetch_chart(pair, range).await
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    FetchError::TransportFailure {
        message: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Epoch seconds of local midnight starting `date` in `tz`
fn day_start_epoch(date: NaiveDate, tz: Tz) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    // A DST jump can skip midnight; the day then starts at the first valid local hour
    (0..=3)
        .map(|h| midnight + Duration::hours(h))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight).timestamp())
}

fn no_data(symbol: &str, range: DateRange) -> FetchError {
    FetchError::NoDataAvailable {
        symbol: symbol.to_string(),
        start: range.start(),
        end: range.end(),
    }
}

/// Map an upstream error answer to a fetch error
fn classify_rejection(status: u16, body: &str, symbol: &str, range: DateRange) -> FetchError {
    let api_error = serde_json::from_str::<ChartEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.chart.error);

    match api_error {
        Some(err) => {
            let description = err.description.unwrap_or_default();
            if description.to_lowercase().contains("no data found") {
                return no_data(symbol, range);
            }
            FetchError::UpstreamRejected {
                status,
                message: match err.code {
                    Some(code) => format!("{}: {}", code, description),
                    None => description,
                },
            }
        }
        None => FetchError::UpstreamRejected {
            status,
            message: body.chars().take(200).collect(),
        },
    }
}

/// Largest volume the store can hold
const MAX_VOLUME: u64 = i64::MAX as u64;

fn finite_positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Parse a chart API body into daily records inside `range`.
///
/// Rows with a missing or invalid field are dropped. Days are taken in `tz`;
/// when the upstream repeats a day the last row wins.
pub fn parse_chart(
    body: &str,
    symbol: &str,
    range: DateRange,
    tz: Tz,
) -> std::result::Result<Vec<RateRecord>, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedPayload(format!("Invalid chart JSON: {}", e)))?;

    let result = match envelope.chart.result {
        Some(mut results) if !results.is_empty() => results.swap_remove(0),
        _ => {
            return Err(match envelope.chart.error {
                Some(_) => classify_rejection(200, body, symbol, range),
                None => no_data(symbol, range),
            })
        }
    };

    let timestamps = match result.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(no_data(symbol, range)),
    };

    let quote = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .ok_or_else(|| FetchError::MalformedPayload("Missing indicators.quote[0]".to_string()))?;

    let series = |name: &str,
                  values: Option<Vec<Option<f64>>>|
     -> std::result::Result<Vec<Option<f64>>, FetchError> {
        let values = values
            .ok_or_else(|| FetchError::MalformedPayload(format!("Missing {} series", name)))?;
        if values.len() != timestamps.len() {
            return Err(FetchError::MalformedPayload(format!(
                "{} series has {} values for {} timestamps",
                name,
                values.len(),
                timestamps.len()
            )));
        }
        Ok(values)
    };
    let open = series("open", quote.open)?;
    let high = series("high", quote.high)?;
    let low = series("low", quote.low)?;
    let close = series("close", quote.close)?;
    let volume = series("volume", quote.volume)?;

    let mut by_day: BTreeMap<NaiveDate, RateRecord> = BTreeMap::new();
    let mut dropped = 0usize;

    for (i, ts) in timestamps.iter().enumerate() {
        let Some(instant) = Utc.timestamp_opt(*ts, 0).single() else {
            dropped += 1;
            continue;
        };
        let date = instant.with_timezone(&tz).date_naive();
        if !range.contains(date) {
            continue;
        }

        let row = (
            finite_positive(open[i]),
            finite_positive(high[i]),
            finite_positive(low[i]),
            finite_positive(close[i]),
            volume[i].filter(|v| v.is_finite() && *v >= 0.0),
        );
        match row {
            (Some(o), Some(h), Some(l), Some(c), Some(v)) => {
                by_day.insert(date, RateRecord::new(date, o, h, l, c, (v as u64).min(MAX_VOLUME)));
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {} incomplete rows for {}", dropped, symbol);
    }
    if by_day.is_empty() {
        return Err(no_data(symbol, range));
    }

    Ok(by_day.into_values().collect())
}
