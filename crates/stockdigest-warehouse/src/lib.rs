//! # stockdigest warehouse
//!
//! DuckDB-backed persistence for the daily stock cache.
//!
//! The crate stores opaque JSON payloads keyed by `(ticker, source, cache_date)`,
//! a "latest across sources" index keyed by ticker, per-source call-budget rows
//! and a small key/value metadata table. It knows nothing about the record
//! schema; callers serialize and deserialize payloads themselves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stockdigest_warehouse::{CachedRecordRow, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     warehouse.upsert_cached_record(&CachedRecordRow {
//!         ticker: "AAPL".to_string(),
//!         source: "alpha_vantage".to_string(),
//!         cache_date: "2026-03-02".to_string(),
//!         data_json: r#"{"ticker":"AAPL"}"#.to_string(),
//!         collected_at: "2026-03-02T14:00:00Z".to_string(),
//!         collected_at_ms: 1_772_460_000_000,
//!     })?;
//!
//!     let latest = warehouse.latest_cached_record("AAPL", None)?;
//!     println!("{latest:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `stock_cache` | One payload per ticker, source and calendar date |
//! | `latest_cache` | Most recent payload per ticker from any source |
//! | `source_budget` | Daily call budget state per upstream source |
//! | `cache_metadata` | Key/value metadata (creation time, last cleanup) |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_cache_counts` | Record and ticker counts per source |
//! | `vw_cache_days` | Record counts per source and cache date |

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, Row};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{ConnectionPool, PooledConnection};

/// File name of the cache database inside the cache directory.
pub const DB_FILE_NAME: &str = "stock_cache.duckdb";

/// Errors raised by warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row failed validation before it reached the database.
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// Location of the cache database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for stockdigest state.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept by the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    /// Standard layout under `home`: `<home>/cache/stock_cache.duckdb`.
    pub fn for_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let db_path = home.join("cache").join(DB_FILE_NAME);
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }

    /// Directory holding the database, the metadata mirror and CSV snapshots.
    pub fn cache_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.home.join("cache"))
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_home())
    }
}

/// One cached payload as stored in `stock_cache` / `latest_cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedRecordRow {
    pub ticker: String,
    pub source: String,
    /// Calendar date (`YYYY-MM-DD`) the payload was written under.
    pub cache_date: String,
    pub data_json: String,
    /// RFC3339 collection timestamp.
    pub collected_at: String,
    /// Collection timestamp as unix milliseconds, used for ordering.
    pub collected_at_ms: i64,
}

/// Persisted call-budget state of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetRow {
    pub source: String,
    pub last_call_at: Option<String>,
    pub last_call_ms: Option<i64>,
    pub last_call_date: Option<String>,
    pub daily_call_count: i64,
    pub max_daily_calls: i64,
    pub last_success_at: Option<String>,
}

/// Timestamp of a recorded upstream call.
#[derive(Debug, Clone, Copy)]
pub struct CallStamp<'a> {
    /// RFC3339 timestamp.
    pub at: &'a str,
    pub at_ms: i64,
    /// Calendar date (`YYYY-MM-DD`) of the call.
    pub date: &'a str,
}

/// Row of the `vw_cache_counts` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCacheCount {
    pub source: String,
    pub record_count: i64,
    pub ticker_count: i64,
    pub newest_cache_date: Option<String>,
}

/// Row of the `vw_cache_days` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheDayCount {
    pub source: String,
    pub cache_date: String,
    pub record_count: i64,
}

/// Rows removed by [`Warehouse::delete_cached_before`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupCounts {
    pub stock_cache: usize,
    pub latest_cache: usize,
}

impl CleanupCounts {
    pub const fn total(self) -> usize {
        self.stock_cache + self.latest_cache
    }
}

/// Handle to the cache database.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open the warehouse at the default location.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (and create if needed) the warehouse described by `config`.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        tracing::debug!(path = %warehouse.db_path().display(), "cache database ready");
        Ok(warehouse)
    }

    /// Apply migrations and (re)create views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Upsert a payload under its `(ticker, source, cache_date)` key and point
    /// the latest-across-sources index at it. Both writes commit together.
    pub fn upsert_cached_record(&self, row: &CachedRecordRow) -> Result<(), WarehouseError> {
        if row.ticker.trim().is_empty() {
            return Err(WarehouseError::InvalidRow(String::from(
                "cached record ticker must not be empty",
            )));
        }
        if row.source.trim().is_empty() {
            return Err(WarehouseError::InvalidRow(String::from(
                "cached record source must not be empty",
            )));
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            connection.execute(
                "INSERT OR REPLACE INTO stock_cache \
                 (ticker, source, cache_date, data_json, collected_at, collected_at_ms) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    row.ticker,
                    row.source,
                    row.cache_date,
                    row.data_json,
                    row.collected_at,
                    row.collected_at_ms
                ],
            )?;

            connection.execute(
                "INSERT OR REPLACE INTO latest_cache \
                 (ticker, source, cache_date, data_json, collected_at, collected_at_ms) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    row.ticker,
                    row.source,
                    row.cache_date,
                    row.data_json,
                    row.collected_at,
                    row.collected_at_ms
                ],
            )?;

            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Most recent payload for `ticker`, restricted to `source` when given.
    pub fn latest_cached_record(
        &self,
        ticker: &str,
        source: Option<&str>,
    ) -> Result<Option<CachedRecordRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let row = match source {
            Some(source) => first_row(
                &connection,
                "SELECT ticker, source, cache_date, data_json, collected_at, collected_at_ms \
                 FROM stock_cache WHERE ticker = ? AND source = ? \
                 ORDER BY collected_at_ms DESC LIMIT 1",
                params![ticker, source],
                read_cached_row,
            )?,
            None => first_row(
                &connection,
                "SELECT ticker, source, cache_date, data_json, collected_at, collected_at_ms \
                 FROM latest_cache WHERE ticker = ?",
                params![ticker],
                read_cached_row,
            )?,
        };
        Ok(row)
    }

    /// Distinct tickers with at least one cached payload, sorted.
    pub fn cached_tickers(&self, source: Option<&str>) -> Result<Vec<String>, WarehouseError> {
        let connection = self.pool.acquire()?;
        let tickers = match source {
            Some(source) => collect_rows(
                &connection,
                "SELECT DISTINCT ticker FROM stock_cache WHERE source = ? ORDER BY ticker",
                params![source],
                |row| row.get(0),
            )?,
            None => collect_rows(
                &connection,
                "SELECT DISTINCT ticker FROM stock_cache ORDER BY ticker",
                params![],
                |row| row.get(0),
            )?,
        };
        Ok(tickers)
    }

    /// Delete payloads whose cache date is strictly before `cutoff_date`.
    pub fn delete_cached_before(&self, cutoff_date: &str) -> Result<CleanupCounts, WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<CleanupCounts, WarehouseError> {
            let stock_cache = connection.execute(
                "DELETE FROM stock_cache WHERE cache_date < ?",
                params![cutoff_date],
            )?;
            let latest_cache = connection.execute(
                "DELETE FROM latest_cache WHERE cache_date < ?",
                params![cutoff_date],
            )?;
            Ok(CleanupCounts {
                stock_cache,
                latest_cache,
            })
        })();

        finalize_transaction(&connection, result)
    }

    /// Per-source counts from `vw_cache_counts`.
    pub fn source_counts(&self) -> Result<Vec<SourceCacheCount>, WarehouseError> {
        let connection = self.pool.acquire()?;
        collect_rows(
            &connection,
            "SELECT source, record_count, ticker_count, newest_cache_date \
             FROM vw_cache_counts ORDER BY source",
            params![],
            |row| {
                Ok(SourceCacheCount {
                    source: row.get(0)?,
                    record_count: row.get(1)?,
                    ticker_count: row.get(2)?,
                    newest_cache_date: row.get(3)?,
                })
            },
        )
    }

    /// Per-day counts from `vw_cache_days`, newest first.
    pub fn cache_days(&self) -> Result<Vec<CacheDayCount>, WarehouseError> {
        let connection = self.pool.acquire()?;
        collect_rows(
            &connection,
            "SELECT source, cache_date, record_count FROM vw_cache_days \
             ORDER BY cache_date DESC, source",
            params![],
            |row| {
                Ok(CacheDayCount {
                    source: row.get(0)?,
                    cache_date: row.get(1)?,
                    record_count: row.get(2)?,
                })
            },
        )
    }

    /// Number of tickers in the latest-across-sources index.
    pub fn latest_index_len(&self) -> Result<i64, WarehouseError> {
        let connection = self.pool.acquire()?;
        let count = connection.query_row("SELECT COUNT(*) FROM latest_cache", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    pub fn budget_row(&self, source: &str) -> Result<Option<BudgetRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        select_budget_row(&connection, source)
    }

    pub fn budget_rows(&self) -> Result<Vec<BudgetRow>, WarehouseError> {
        let connection = self.pool.acquire()?;
        collect_rows(
            &connection,
            "SELECT source, last_call_at, last_call_ms, last_call_date, daily_call_count, \
             max_daily_calls, last_success_at FROM source_budget ORDER BY source",
            params![],
            read_budget_row,
        )
    }

    /// Zero the daily counter of `source` when its last call happened before `today`.
    /// Returns whether a reset was written.
    pub fn reset_daily_count(&self, source: &str, today: &str) -> Result<bool, WarehouseError> {
        let connection = self.pool.acquire()?;
        let changed = connection.execute(
            "UPDATE source_budget SET daily_call_count = 0 \
             WHERE source = ? AND last_call_date < ? AND daily_call_count <> 0",
            params![source, today],
        )?;
        Ok(changed > 0)
    }

    /// Record one upstream call for `source`.
    ///
    /// The rollover reset and the increment happen in a single statement inside
    /// a transaction, so two recorders never lose an increment.
    pub fn record_call(
        &self,
        source: &str,
        call: CallStamp<'_>,
        default_max_daily_calls: i64,
    ) -> Result<BudgetRow, WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<BudgetRow, WarehouseError> {
            ensure_budget_row(&connection, source, default_max_daily_calls)?;
            connection.execute(
                "UPDATE source_budget SET \
                 daily_call_count = CASE \
                     WHEN last_call_date IS NULL OR last_call_date < ? THEN 1 \
                     ELSE daily_call_count + 1 END, \
                 last_call_at = ?, last_call_ms = ?, last_call_date = ? \
                 WHERE source = ?",
                params![call.date, call.at, call.at_ms, call.date, source],
            )?;
            select_budget_row(&connection, source)?.ok_or_else(|| {
                WarehouseError::InvalidRow(format!("budget row for '{source}' vanished"))
            })
        })();

        finalize_transaction(&connection, result)
    }

    /// Stamp the last successful update of `source`.
    pub fn record_success(
        &self,
        source: &str,
        at: &str,
        default_max_daily_calls: i64,
    ) -> Result<BudgetRow, WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<BudgetRow, WarehouseError> {
            ensure_budget_row(&connection, source, default_max_daily_calls)?;
            connection.execute(
                "UPDATE source_budget SET last_success_at = ? WHERE source = ?",
                params![at, source],
            )?;
            select_budget_row(&connection, source)?.ok_or_else(|| {
                WarehouseError::InvalidRow(format!("budget row for '{source}' vanished"))
            })
        })();

        finalize_transaction(&connection, result)
    }

    /// Override the daily call limit of `source`.
    pub fn set_max_daily_calls(&self, source: &str, max_daily_calls: i64) -> Result<(), WarehouseError> {
        if max_daily_calls < 0 {
            return Err(WarehouseError::InvalidRow(format!(
                "max_daily_calls must be non-negative, got {max_daily_calls}"
            )));
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            ensure_budget_row(&connection, source, max_daily_calls)?;
            connection.execute(
                "UPDATE source_budget SET max_daily_calls = ? WHERE source = ?",
                params![max_daily_calls, source],
            )?;
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    pub fn metadata_value(&self, key: &str) -> Result<Option<String>, WarehouseError> {
        let connection = self.pool.acquire()?;
        first_row(
            &connection,
            "SELECT value FROM cache_metadata WHERE key = ?",
            params![key],
            |row| row.get(0),
        )
    }

    pub fn set_metadata_value(&self, key: &str, value: &str) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute(
            "INSERT OR REPLACE INTO cache_metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Store `value` under `key` unless a value already exists; returns the stored value.
    pub fn metadata_value_or_insert(&self, key: &str, value: &str) -> Result<String, WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute(
            "INSERT OR IGNORE INTO cache_metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        let stored = first_row(
            &connection,
            "SELECT value FROM cache_metadata WHERE key = ?",
            params![key],
            |row| row.get(0),
        )?;
        Ok(stored.unwrap_or_else(|| value.to_string()))
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = connection.execute_batch("ROLLBACK") {
                tracing::error!(error = %rollback_error, "rollback failed");
            }
            Err(error)
        }
    }
}

fn ensure_budget_row(
    connection: &Connection,
    source: &str,
    default_max_daily_calls: i64,
) -> Result<(), WarehouseError> {
    connection.execute(
        "INSERT OR IGNORE INTO source_budget (source, daily_call_count, max_daily_calls) \
         VALUES (?, 0, ?)",
        params![source, default_max_daily_calls],
    )?;
    Ok(())
}

fn select_budget_row(connection: &Connection, source: &str) -> Result<Option<BudgetRow>, WarehouseError> {
    first_row(
        connection,
        "SELECT source, last_call_at, last_call_ms, last_call_date, daily_call_count, \
         max_daily_calls, last_success_at FROM source_budget WHERE source = ?",
        params![source],
        read_budget_row,
    )
}

fn read_cached_row(row: &Row<'_>) -> Result<CachedRecordRow, ::duckdb::Error> {
    Ok(CachedRecordRow {
        ticker: row.get(0)?,
        source: row.get(1)?,
        cache_date: row.get(2)?,
        data_json: row.get(3)?,
        collected_at: row.get(4)?,
        collected_at_ms: row.get(5)?,
    })
}

fn read_budget_row(row: &Row<'_>) -> Result<BudgetRow, ::duckdb::Error> {
    Ok(BudgetRow {
        source: row.get(0)?,
        last_call_at: row.get(1)?,
        last_call_ms: row.get(2)?,
        last_call_date: row.get(3)?,
        daily_call_count: row.get(4)?,
        max_daily_calls: row.get(5)?,
        last_success_at: row.get(6)?,
    })
}

fn collect_rows<T, F>(
    connection: &Connection,
    sql: &str,
    params: &[&dyn ::duckdb::ToSql],
    map: F,
) -> Result<Vec<T>, WarehouseError>
where
    F: FnMut(&Row<'_>) -> Result<T, ::duckdb::Error>,
{
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params, map)?;
    let collected = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(collected)
}

fn first_row<T, F>(
    connection: &Connection,
    sql: &str,
    params: &[&dyn ::duckdb::ToSql],
    map: F,
) -> Result<Option<T>, WarehouseError>
where
    F: FnMut(&Row<'_>) -> Result<T, ::duckdb::Error>,
{
    let mut statement = connection.prepare(sql)?;
    let mut rows = statement.query_map(params, map)?;
    let first = rows.next().transpose()?;
    Ok(first)
}

/// Resolve the stockdigest home directory from the environment.
fn resolve_home() -> PathBuf {
    if let Some(path) = env::var_os("STOCKDIGEST_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".stockdigest");
    }

    PathBuf::from(".stockdigest")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Warehouse) {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::for_home(temp.path().join("home")))
            .expect("warehouse open");
        (temp, warehouse)
    }

    fn row(ticker: &str, source: &str, cache_date: &str, ms: i64, payload: &str) -> CachedRecordRow {
        CachedRecordRow {
            ticker: ticker.to_string(),
            source: source.to_string(),
            cache_date: cache_date.to_string(),
            data_json: payload.to_string(),
            collected_at: format!("{cache_date}T12:00:00Z"),
            collected_at_ms: ms,
        }
    }

    #[test]
    fn initializes_tables_and_views() {
        let (_temp, warehouse) = open_temp();
        let connection = warehouse.pool.acquire().expect("acquire");

        for table in ["stock_cache", "latest_cache", "source_budget", "cache_metadata"] {
            let count: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                    params![table],
                    |row| row.get(0),
                )
                .expect("query");
            assert_eq!(count, 1, "missing table {table}");
        }
        assert!(warehouse.source_counts().expect("view query").is_empty());
    }

    #[test]
    fn same_key_upsert_keeps_last_write() {
        let (_temp, warehouse) = open_temp();

        warehouse
            .upsert_cached_record(&row("AAPL", "yahoo_finance", "2026-03-02", 1, "{\"v\":1}"))
            .expect("first write");
        warehouse
            .upsert_cached_record(&row("AAPL", "yahoo_finance", "2026-03-02", 2, "{\"v\":2}"))
            .expect("second write");

        let counts = warehouse.source_counts().expect("counts");
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].record_count, 1);

        let latest = warehouse
            .latest_cached_record("AAPL", Some("yahoo_finance"))
            .expect("query")
            .expect("row present");
        assert_eq!(latest.data_json, "{\"v\":2}");
    }

    #[test]
    fn latest_index_follows_last_writer_across_sources() {
        let (_temp, warehouse) = open_temp();

        warehouse
            .upsert_cached_record(&row("MSFT", "yahoo_finance", "2026-03-02", 10, "{\"from\":\"y\"}"))
            .expect("yahoo write");
        warehouse
            .upsert_cached_record(&row("MSFT", "alpha_vantage", "2026-03-02", 5, "{\"from\":\"a\"}"))
            .expect("alpha write");

        let latest = warehouse
            .latest_cached_record("MSFT", None)
            .expect("query")
            .expect("row present");
        assert_eq!(latest.source, "alpha_vantage");
        assert_eq!(warehouse.latest_index_len().expect("len"), 1);

        let per_source = warehouse
            .latest_cached_record("MSFT", Some("yahoo_finance"))
            .expect("query")
            .expect("row present");
        assert_eq!(per_source.data_json, "{\"from\":\"y\"}");
    }

    #[test]
    fn parameterized_writes_store_hostile_tickers_verbatim() {
        let (_temp, warehouse) = open_temp();
        let hostile = r#"AAPL'; DROP TABLE stock_cache; --"#;

        warehouse
            .upsert_cached_record(&row(hostile, "alpha_vantage", "2026-03-02", 1, "{}"))
            .expect("write");

        assert_eq!(
            warehouse.cached_tickers(None).expect("tickers"),
            vec![hostile.to_string()]
        );
    }

    #[test]
    fn cached_tickers_filter_by_source() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .upsert_cached_record(&row("NVDA", "yahoo_finance", "2026-03-02", 1, "{}"))
            .expect("write");
        warehouse
            .upsert_cached_record(&row("AAPL", "alpha_vantage", "2026-03-02", 1, "{}"))
            .expect("write");
        warehouse
            .upsert_cached_record(&row("AAPL", "yahoo_finance", "2026-03-01", 1, "{}"))
            .expect("write");

        assert_eq!(
            warehouse.cached_tickers(Some("yahoo_finance")).expect("tickers"),
            vec!["AAPL".to_string(), "NVDA".to_string()]
        );
        assert_eq!(
            warehouse.cached_tickers(Some("alpha_vantage")).expect("tickers"),
            vec!["AAPL".to_string()]
        );
        assert_eq!(warehouse.cached_tickers(None).expect("tickers").len(), 2);
    }

    #[test]
    fn delete_before_cutoff_is_strict() {
        let (_temp, warehouse) = open_temp();
        warehouse
            .upsert_cached_record(&row("AAPL", "yahoo_finance", "2026-02-20", 1, "{}"))
            .expect("old write");
        warehouse
            .upsert_cached_record(&row("MSFT", "yahoo_finance", "2026-02-23", 2, "{}"))
            .expect("boundary write");

        let counts = warehouse.delete_cached_before("2026-02-23").expect("cleanup");
        assert_eq!(counts.stock_cache, 1);
        assert_eq!(counts.latest_cache, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(
            warehouse.cached_tickers(None).expect("tickers"),
            vec!["MSFT".to_string()]
        );
        assert_eq!(warehouse.cache_days().expect("days").len(), 1);
    }

    #[test]
    fn record_call_increments_then_rolls_over() {
        let (_temp, warehouse) = open_temp();
        let day_one = CallStamp {
            at: "2026-03-02T09:00:00Z",
            at_ms: 1,
            date: "2026-03-02",
        };

        let first = warehouse.record_call("alpha_vantage", day_one, 1).expect("call");
        assert_eq!(first.daily_call_count, 1);
        assert_eq!(first.max_daily_calls, 1);
        let second = warehouse.record_call("alpha_vantage", day_one, 1).expect("call");
        assert_eq!(second.daily_call_count, 2);

        let day_two = CallStamp {
            at: "2026-03-03T09:00:00Z",
            at_ms: 2,
            date: "2026-03-03",
        };
        let third = warehouse.record_call("alpha_vantage", day_two, 1).expect("call");
        assert_eq!(third.daily_call_count, 1);
        assert_eq!(third.last_call_date.as_deref(), Some("2026-03-03"));
    }

    #[test]
    fn reset_only_touches_prior_day_counts() {
        let (_temp, warehouse) = open_temp();
        let stamp = CallStamp {
            at: "2026-03-02T09:00:00Z",
            at_ms: 1,
            date: "2026-03-02",
        };
        warehouse.record_call("yahoo_finance", stamp, 1).expect("call");

        assert!(!warehouse.reset_daily_count("yahoo_finance", "2026-03-02").expect("same day"));
        assert!(warehouse.reset_daily_count("yahoo_finance", "2026-03-03").expect("next day"));
        let row = warehouse.budget_row("yahoo_finance").expect("row").expect("present");
        assert_eq!(row.daily_call_count, 0);
        assert_eq!(row.last_call_date.as_deref(), Some("2026-03-02"));
    }

    #[test]
    fn success_and_limits_are_persisted_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let config = WarehouseConfig::for_home(temp.path());
        {
            let warehouse = Warehouse::open(config.clone()).expect("open");
            warehouse
                .record_success("yahoo_finance", "2026-03-02T10:00:00Z", 1)
                .expect("success");
            warehouse.set_max_daily_calls("yahoo_finance", 3).expect("limit");
            warehouse.set_metadata_value("last_cache_cleanup", "2026-03-01T00:00:00Z").expect("meta");
        }

        let reopened = Warehouse::open(config).expect("reopen");
        let row = reopened.budget_row("yahoo_finance").expect("row").expect("present");
        assert_eq!(row.last_success_at.as_deref(), Some("2026-03-02T10:00:00Z"));
        assert_eq!(row.max_daily_calls, 3);
        assert_eq!(row.daily_call_count, 0);
        assert_eq!(
            reopened.metadata_value("last_cache_cleanup").expect("meta").as_deref(),
            Some("2026-03-01T00:00:00Z")
        );
    }

    #[test]
    fn metadata_insert_keeps_first_value() {
        let (_temp, warehouse) = open_temp();
        let created = warehouse
            .metadata_value_or_insert("cache_created", "2026-03-01T00:00:00Z")
            .expect("insert");
        let again = warehouse
            .metadata_value_or_insert("cache_created", "2026-03-05T00:00:00Z")
            .expect("insert");
        assert_eq!(created, "2026-03-01T00:00:00Z");
        assert_eq!(again, created);
    }

    #[test]
    fn negative_limits_are_rejected() {
        let (_temp, warehouse) = open_temp();
        let error = warehouse
            .set_max_daily_calls("alpha_vantage", -1)
            .expect_err("negative limit");
        assert!(matches!(error, WarehouseError::InvalidRow(_)));
    }
}
