//! Tests for error construction, message formatting and classification

use chrono::NaiveDate;
use rusty_forex::error::{FetchError, ForexError};
use rusty_forex::period::{Period, RangeRequest};
use rusty_forex::types::{CurrencyPair, DateRange};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
}

#[test]
fn test_fetch_error_messages() {
    let err = FetchError::NoDataAvailable {
        symbol: "USDEUR=X".to_string(),
        start: d(1),
        end: d(3),
    };
    let msg = err.to_string();
    assert!(msg.contains("No data available"));
    assert!(msg.contains("USDEUR=X"));
    assert!(msg.contains("2024-02-01"));
    assert!(msg.contains("2024-02-03"));

    let err = FetchError::UpstreamRejected {
        status: 429,
        message: "Too Many Requests".to_string(),
    };
    assert!(err.to_string().contains("429"));
    assert!(err.to_string().contains("Too Many Requests"));
}

#[test]
fn test_fetch_error_retry_classification() {
    let transport = FetchError::TransportFailure {
        message: "operation timed out".to_string(),
        timed_out: true,
    };
    let rejected = FetchError::UpstreamRejected {
        status: 500,
        message: String::new(),
    };
    let malformed = FetchError::MalformedPayload("truncated".to_string());
    let no_data = FetchError::NoDataAvailable {
        symbol: "X".to_string(),
        start: d(1),
        end: d(1),
    };

    assert!(transport.is_retryable());
    assert!(rejected.is_retryable());
    assert!(malformed.is_retryable());
    assert!(!no_data.is_retryable());
    assert!(no_data.is_no_data());
    assert!(!transport.is_no_data());
}

#[test]
fn test_fetch_error_converts_into_forex_error() {
    let err: ForexError = FetchError::MalformedPayload("bad".to_string()).into();
    assert!(matches!(err, ForexError::Fetch(FetchError::MalformedPayload(_))));
    assert!(err.to_string().starts_with("Fetch error"));
}

#[test]
fn test_invalid_requests() {
    assert!(matches!(
        DateRange::new(d(3), d(1)),
        Err(ForexError::InvalidRequest(_))
    ));
    assert!(matches!(
        Period::parse("10Y"),
        Err(ForexError::InvalidRequest(_))
    ));
    assert!(matches!(
        RangeRequest::parse(None, None, None),
        Err(ForexError::InvalidRequest(_))
    ));
    assert!(matches!(
        "".parse::<CurrencyPair>(),
        Err(ForexError::InvalidRequest(_))
    ));
}

#[test]
fn test_storage_error_from_sqlite() {
    let err: ForexError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, ForexError::Storage(_)));
    assert!(err.to_string().contains("Storage error"));
}
