//! Durable Cache Store.
//!
//! Typed facade over the warehouse record tables. Records are serialized to
//! flat JSON and keyed by `(ticker, source, cache_date)`; every write also
//! updates the "latest across sources" index.
//!
//! Freshness is evaluated when reading, never when writing: a stored record
//! is returned only while `now - collected_at <= max_age_hours`.
//!
//! Reads never fail. A storage or decode error is logged and reported as
//! "not found", leaving the fallback chain to absorb it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use stockdigest_warehouse::{CacheDayCount, CachedRecordRow, SourceCacheCount, Warehouse};
use time::Duration;

use crate::clock::Clock;
use crate::domain::{format_cache_date, StockRecord, Ticker, UtcDateTime};
use crate::error::CoreError;
use crate::metadata::{MetadataMirror, CACHE_CREATED_KEY, LAST_CLEANUP_KEY};
use crate::source::SourceId;

pub const DEFAULT_MAX_AGE_HOURS: u32 = 24;
pub const DEFAULT_CLEANUP_DAYS: u32 = 7;

/// Counts and locations reported by [`DurableCacheStore::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStoreStatus {
    pub db_path: PathBuf,
    pub metadata_path: PathBuf,
    pub cache_created: Option<String>,
    pub last_cache_cleanup: Option<String>,
    pub latest_index_len: i64,
    pub sources: Vec<SourceCacheCount>,
    pub days: Vec<CacheDayCount>,
}

pub struct DurableCacheStore {
    warehouse: Warehouse,
    clock: Arc<dyn Clock>,
    mirror: MetadataMirror,
}

impl DurableCacheStore {
    /// Wrap an opened warehouse and stamp the cache creation time on first use.
    pub fn new(warehouse: Warehouse, clock: Arc<dyn Clock>) -> Self {
        let mirror = MetadataMirror::new(warehouse.clone());
        let store = Self {
            warehouse,
            clock,
            mirror,
        };

        let created = store.clock.now().format_rfc3339();
        match store
            .warehouse
            .metadata_value_or_insert(CACHE_CREATED_KEY, &created)
        {
            Ok(stored) if stored == created => store.mirror.refresh(),
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(error = %error, "failed to record cache creation time");
            }
        }
        store
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Upsert `record` for `source` under today's date, in the keyed table and
    /// the latest index, atomically.
    pub fn put(&self, source: SourceId, record: &StockRecord) -> Result<(), CoreError> {
        let mut stored = record.clone();
        stored.cache_date = self.clock.today();

        let row = CachedRecordRow {
            ticker: stored.ticker.as_str().to_string(),
            source: source.as_str().to_string(),
            cache_date: format_cache_date(stored.cache_date),
            data_json: serde_json::to_string(&stored)?,
            collected_at: stored.collected_at.format_rfc3339(),
            collected_at_ms: stored.collected_at.unix_millis(),
        };
        self.warehouse.upsert_cached_record(&row)?;
        Ok(())
    }

    /// Best-effort [`put`](Self::put) of a batch; returns how many were stored.
    pub fn put_batch(&self, source: SourceId, records: &[StockRecord]) -> usize {
        let stored = records
            .iter()
            .filter(|record| match self.put(source, record) {
                Ok(()) => true,
                Err(error) => {
                    tracing::error!(
                        source = %source,
                        ticker = %record.ticker,
                        error = %error,
                        "failed to persist record"
                    );
                    false
                }
            })
            .count();

        tracing::info!(source = %source, count = stored, "persisted batch to cache");
        stored
    }

    /// Most recent fresh record for `ticker`, from `source` or from any source.
    pub fn get(
        &self,
        ticker: &Ticker,
        source: Option<SourceId>,
        max_age_hours: u32,
    ) -> Option<StockRecord> {
        let row = match self
            .warehouse
            .latest_cached_record(ticker.as_str(), source.map(SourceId::as_str))
        {
            Ok(row) => row?,
            Err(error) => {
                tracing::warn!(ticker = %ticker, error = %error, "cache read failed");
                return None;
            }
        };

        if !self.is_fresh(&row, max_age_hours) {
            tracing::debug!(
                ticker = %ticker,
                collected_at = %row.collected_at,
                max_age_hours,
                "cached record is stale"
            );
            return None;
        }

        match serde_json::from_str::<StockRecord>(&row.data_json) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(ticker = %ticker, error = %error, "cached record is unreadable");
                None
            }
        }
    }

    /// Fresh records for `tickers`, in request order, skipping misses.
    pub fn get_many(&self, tickers: &[Ticker], max_age_hours: u32) -> Vec<StockRecord> {
        tickers
            .iter()
            .filter_map(|ticker| self.get(ticker, None, max_age_hours))
            .collect()
    }

    /// Distinct cached tickers, sorted, optionally for one source.
    pub fn list_tickers(&self, source: Option<SourceId>) -> Vec<Ticker> {
        match self.warehouse.cached_tickers(source.map(SourceId::as_str)) {
            Ok(tickers) => tickers
                .iter()
                .filter_map(|ticker| Ticker::parse(ticker).ok())
                .collect(),
            Err(error) => {
                tracing::warn!(error = %error, "failed to list cached tickers");
                Vec::new()
            }
        }
    }

    /// Delete records dated strictly before `today - max_age_days`.
    /// Returns the number of rows removed from both tables.
    pub fn cleanup(&self, max_age_days: u32) -> usize {
        let cutoff = self
            .clock
            .today()
            .checked_sub(Duration::days(i64::from(max_age_days)))
            .unwrap_or(time::Date::MIN);
        let cutoff = format_cache_date(cutoff);

        let counts = match self.warehouse.delete_cached_before(&cutoff) {
            Ok(counts) => counts,
            Err(error) => {
                tracing::error!(cutoff = %cutoff, error = %error, "cache cleanup failed");
                return 0;
            }
        };

        let removed = counts.total();
        if removed > 0 {
            let now = self.clock.now().format_rfc3339();
            if let Err(error) = self.warehouse.set_metadata_value(LAST_CLEANUP_KEY, &now) {
                tracing::warn!(error = %error, "failed to record cleanup time");
            }
            self.mirror.refresh();
        }

        tracing::info!(
            cutoff = %cutoff,
            stock_cache = counts.stock_cache,
            latest_cache = counts.latest_cache,
            "cache cleanup finished"
        );
        removed
    }

    pub fn status(&self) -> Result<CacheStoreStatus, CoreError> {
        Ok(CacheStoreStatus {
            db_path: self.warehouse.db_path().to_path_buf(),
            metadata_path: self.mirror.path().to_path_buf(),
            cache_created: self.warehouse.metadata_value(CACHE_CREATED_KEY)?,
            last_cache_cleanup: self.warehouse.metadata_value(LAST_CLEANUP_KEY)?,
            latest_index_len: self.warehouse.latest_index_len()?,
            sources: self.warehouse.source_counts()?,
            days: self.warehouse.cache_days()?,
        })
    }

    fn is_fresh(&self, row: &CachedRecordRow, max_age_hours: u32) -> bool {
        let Ok(collected_at) = UtcDateTime::from_unix_millis(row.collected_at_ms) else {
            return false;
        };
        let age = self.clock.now().since(collected_at);
        age <= Duration::hours(i64::from(max_age_hours))
    }
}
