//! Gap detection over a requested date range

use crate::types::{DateRange, MissingRange};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Minimal ordered list of missing contiguous sub-ranges of `range`.
///
/// Each returned range is a maximal run of consecutive days absent from
/// `existing`. When nothing at all is present the whole request comes back as
/// a single gap, so a cold pair costs one upstream call.
pub fn find_missing(range: DateRange, existing: &BTreeSet<NaiveDate>) -> Vec<MissingRange> {
    if existing.range(range.start()..=range.end()).next().is_none() {
        return vec![range];
    }

    let mut missing = Vec::new();
    let mut run: Option<(NaiveDate, NaiveDate)> = None;

    for day in range.days() {
        if existing.contains(&day) {
            if let Some((start, end)) = run.take() {
                missing.push(MissingRange::from_ordered(start, end));
            }
        } else {
            run = match run {
                Some((start, _)) => Some((start, day)),
                None => Some((day, day)),
            };
        }
    }
    if let Some((start, end)) = run {
        missing.push(MissingRange::from_ordered(start, end));
    }

    missing
}

/// Total number of days covered by a list of gaps
pub fn missing_day_count(gaps: &[MissingRange]) -> usize {
    gaps.iter().map(DateRange::len_days).sum()
}
