use chrono::{Datelike, Duration, NaiveDate, Weekday};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rusty_forex::data::{find_missing, RateStore};
use rusty_forex::types::{CurrencyPair, DateRange, RateRecord};
use std::collections::BTreeSet;

fn year_range() -> DateRange {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    DateRange::new(start, start + Duration::days(364)).unwrap()
}

fn benchmark_find_missing(c: &mut Criterion) {
    let range = year_range();
    // Weekdays only, the usual shape of a stored FX series
    let existing: BTreeSet<NaiveDate> = range
        .days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect();

    c.bench_function("find_missing_1y_weekdays", |b| {
        b.iter(|| find_missing(black_box(range), black_box(&existing)));
    });
}

fn benchmark_store(c: &mut Criterion) {
    let pair = CurrencyPair::new("GBP", "INR").unwrap();
    let range = year_range();
    let records: Vec<RateRecord> = range
        .days()
        .enumerate()
        .map(|(i, day)| {
            let v = 100.0 + i as f64 * 0.01;
            RateRecord::new(day, v, v + 0.5, v - 0.5, v, 0)
        })
        .collect();

    c.bench_function("store_upsert_365", |b| {
        let store = RateStore::open_in_memory().unwrap();
        b.iter(|| store.upsert(&pair, black_box(&records)).unwrap());
    });

    let store = RateStore::open_in_memory().unwrap();
    store.upsert(&pair, &records).unwrap();
    c.bench_function("store_read_range_365", |b| {
        b.iter(|| store.read_range(&pair, black_box(range)).unwrap());
    });
}

criterion_group!(benches, benchmark_find_missing, benchmark_store);
criterion_main!(benches);
