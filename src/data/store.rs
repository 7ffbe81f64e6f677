//! Rate store with SQLite backend
//!
//! One row per (pair, date) in `forex_rates`, enforced by a uniqueness
//! constraint; writes go through `INSERT .. ON CONFLICT DO UPDATE` so a
//! re-fetch of the same day overwrites it in place. Days the upstream had no
//! market data for are kept separately in `empty_days`.

use crate::error::{ForexError, Result};
use crate::types::{CurrencyPair, DateRange, RateRecord};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// First/last stored day and row count for one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub rows: usize,
}

/// Durable (pair, date) keyed rate store
///
/// Cloning is cheap; clones share one connection, and the mutex around it
/// serialises writers within the process.
#[derive(Clone)]
pub struct RateStore {
    conn: Arc<Mutex<Connection>>,
}

impl RateStore {
    /// Create or open database at path
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)
            .map_err(|e| ForexError::Storage(format!("Failed to open database: {}", e)))?;
        Self::with_connection(conn)
    }

    /// Create in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ForexError::Storage(format!("Failed to create in-memory database: {}", e))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ForexError::Storage("Rate store connection lock poisoned".to_string()))
    }

    /// Create database tables; safe to run repeatedly
    pub fn create_tables(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS forex_rates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_currency TEXT NOT NULL,
                to_currency TEXT NOT NULL,
                date TEXT NOT NULL,
                open_rate REAL NOT NULL,
                high_rate REAL NOT NULL,
                low_rate REAL NOT NULL,
                close_rate REAL NOT NULL,
                volume INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(from_currency, to_currency, date)
            );
            CREATE TABLE IF NOT EXISTS empty_days (
                from_currency TEXT NOT NULL,
                to_currency TEXT NOT NULL,
                date TEXT NOT NULL,
                checked_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(from_currency, to_currency, date)
            );",
        )
        .map_err(|e| ForexError::Storage(format!("Failed to create tables: {}", e)))?;
        Ok(())
    }

    /// Insert or overwrite records for a pair.
    ///
    /// All records land in one transaction. A real record for a day that was
    /// previously marked empty clears the marker.
    pub fn upsert(&self, pair: &CurrencyPair, records: &[RateRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| ForexError::Storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO forex_rates
                 (from_currency, to_currency, date, open_rate, high_rate, low_rate, close_rate, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(from_currency, to_currency, date) DO UPDATE SET
                     open_rate = excluded.open_rate,
                     high_rate = excluded.high_rate,
                     low_rate = excluded.low_rate,
                     close_rate = excluded.close_rate,
                     volume = excluded.volume",
            )?;
            let mut unmark = tx.prepare_cached(
                "DELETE FROM empty_days WHERE from_currency = ?1 AND to_currency = ?2 AND date = ?3",
            )?;

            for record in records {
                let date = record.date.format(DATE_FORMAT).to_string();
                let volume = i64::try_from(record.volume).map_err(|_| {
                    ForexError::Storage(format!(
                        "Volume {} for {} {} exceeds the storable range",
                        record.volume, pair, record.date
                    ))
                })?;
                upsert
                    .execute(params![
                        &pair.from,
                        &pair.to,
                        &date,
                        record.open,
                        record.high,
                        record.low,
                        record.close,
                        volume,
                    ])
                    .map_err(|e| {
                        ForexError::Storage(format!(
                            "Failed to upsert {} {}: {}",
                            pair, record.date, e
                        ))
                    })?;
                unmark.execute(params![&pair.from, &pair.to, &date])?;
            }
        }
        tx.commit()
            .map_err(|e| ForexError::Storage(format!("Failed to commit upsert: {}", e)))?;

        log::debug!("Upserted {} records for {}", records.len(), pair);
        Ok(records.len())
    }

    /// All records for `pair` inside `range`, ascending by date
    pub fn read_range(&self, pair: &CurrencyPair, range: DateRange) -> Result<Vec<RateRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT date, open_rate, high_rate, low_rate, close_rate, volume
                 FROM forex_rates
                 WHERE from_currency = ?1 AND to_currency = ?2 AND date BETWEEN ?3 AND ?4
                 ORDER BY date ASC",
            )
            .map_err(|e| ForexError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(
                params![
                    &pair.from,
                    &pair.to,
                    range.start().format(DATE_FORMAT).to_string(),
                    range.end().format(DATE_FORMAT).to_string(),
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .map_err(|e| ForexError::Storage(format!("Failed to query rates: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ForexError::Storage(format!("Failed to collect rates: {}", e)))?;

        rows.into_iter()
            .map(|(date, open, high, low, close, volume)| {
                let date = parse_stored_date(&date)?;
                let volume = u64::try_from(volume).map_err(|_| {
                    ForexError::Storage(format!("Corrupt volume {} in store for {}", volume, date))
                })?;
                Ok(RateRecord {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                })
            })
            .collect()
    }

    /// Days in `range` that need no fetch: stored records plus days marked empty
    pub fn present_dates(&self, pair: &CurrencyPair, range: DateRange) -> Result<BTreeSet<NaiveDate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT date FROM forex_rates
             WHERE from_currency = ?1 AND to_currency = ?2 AND date BETWEEN ?3 AND ?4
             UNION
             SELECT date FROM empty_days
             WHERE from_currency = ?1 AND to_currency = ?2 AND date BETWEEN ?3 AND ?4",
        )?;

        let dates = stmt
            .query_map(
                params![
                    &pair.from,
                    &pair.to,
                    range.start().format(DATE_FORMAT).to_string(),
                    range.end().format(DATE_FORMAT).to_string(),
                ],
                |row| row.get::<_, String>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        dates.iter().map(|d| parse_stored_date(d)).collect()
    }

    /// Record days the upstream has no market data for.
    ///
    /// Days that already hold a real record are skipped.
    pub fn mark_empty_days(&self, pair: &CurrencyPair, dates: &[NaiveDate]) -> Result<usize> {
        if dates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut marked = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO empty_days (from_currency, to_currency, date)
                 SELECT ?1, ?2, ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM forex_rates
                     WHERE from_currency = ?1 AND to_currency = ?2 AND date = ?3
                 )",
            )?;
            for date in dates {
                marked += stmt.execute(params![
                    &pair.from,
                    &pair.to,
                    date.format(DATE_FORMAT).to_string()
                ])?;
            }
        }
        tx.commit()?;

        if marked > 0 {
            log::debug!("Marked {} days without market data for {}", marked, pair);
        }
        Ok(marked)
    }

    /// Stored span and row count for a pair, `None` if nothing is stored
    pub fn coverage(&self, pair: &CurrencyPair) -> Result<Option<Coverage>> {
        let conn = self.lock()?;
        let (first, last, rows): (Option<String>, Option<String>, i64) = conn.query_row(
            "SELECT MIN(date), MAX(date), COUNT(*) FROM forex_rates
             WHERE from_currency = ?1 AND to_currency = ?2",
            params![&pair.from, &pair.to],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(Coverage {
                first: parse_stored_date(&first)?,
                last: parse_stored_date(&last)?,
                rows: rows as usize,
            })),
            _ => Ok(None),
        }
    }

    /// Distinct pairs with at least one stored record
    pub fn pairs(&self) -> Result<Vec<CurrencyPair>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT from_currency, to_currency FROM forex_rates
             ORDER BY from_currency, to_currency",
        )?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        pairs
            .iter()
            .map(|(from, to)| CurrencyPair::new(from, to))
            .collect()
    }
}

fn parse_stored_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| ForexError::Storage(format!("Corrupt date '{}' in store: {}", s, e)))
}
