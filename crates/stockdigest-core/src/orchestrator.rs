//! Fallback Orchestrator.
//!
//! Single entry point for stock data. Tiers are tried in a fixed order and
//! each one reports a [`TierOutcome`]; the next tier is chosen on that variant:
//!
//! | Tier | Served when |
//! |------|-------------|
//! | Live | not `force_refresh`, the adapter is available and has budget today |
//! | Cache | the durable store holds fresh records for the request |
//! | Snapshot | the newest CSV snapshot holds records for the request |
//! | Synthetic | always |
//!
//! A dataset always comes from exactly one tier (and, for the live tier, one
//! adapter). Every dataset is enriched before it is returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::adapters::{AlphaVantageAdapter, YahooAdapter};
use crate::budget::{CallBudgetTracker, SourceBudgetState};
use crate::cache::{CacheStoreStatus, DurableCacheStore, DEFAULT_MAX_AGE_HOURS};
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::data_source::StockSource;
use crate::domain::{Dataset, StockRecord, Ticker, TierOutcome, UtcDateTime};
use crate::enrich::enrich;
use crate::error::CoreError;
use crate::http_client::HttpClient;
use crate::snapshot;
use crate::source::{DataSource, SourceId, Tier};
use crate::synthetic;

/// Builds the ordered adapter chain (primary first) from configuration.
#[derive(Debug, Clone, Default)]
pub struct SourceChainBuilder {
    alpha_vantage_api_key: Option<String>,
    yahoo_enabled: bool,
    offline: bool,
}

impl SourceChainBuilder {
    pub fn new() -> Self {
        Self {
            yahoo_enabled: true,
            ..Self::default()
        }
    }

    pub fn from_config(config: &DigestConfig) -> Self {
        Self {
            alpha_vantage_api_key: config.alpha_vantage_api_key.clone(),
            yahoo_enabled: config.yahoo_enabled,
            offline: false,
        }
    }

    #[must_use]
    pub fn with_alpha_vantage_key(mut self, key: impl Into<String>) -> Self {
        self.alpha_vantage_api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_yahoo_enabled(mut self, enabled: bool) -> Self {
        self.yahoo_enabled = enabled;
        self
    }

    /// Keep every adapter registered but report it unavailable.
    #[must_use]
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn build(
        self,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Vec<Arc<dyn StockSource>> {
        let yahoo = YahooAdapter::new(Arc::clone(&http_client), Arc::clone(&clock))
            .with_enabled(self.yahoo_enabled && !self.offline);
        let alpha_vantage_key = if self.offline {
            None
        } else {
            self.alpha_vantage_api_key
        };
        let alpha_vantage = AlphaVantageAdapter::new(http_client, clock, alpha_vantage_key);

        vec![Arc::new(yahoo), Arc::new(alpha_vantage)]
    }
}

/// Availability and budget of one adapter, as reported by
/// [`FallbackOrchestrator::get_system_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub source: SourceId,
    pub description: &'static str,
    pub available: bool,
    pub can_call_today: bool,
    pub budget: Option<SourceBudgetState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub generated_at: UtcDateTime,
    pub sources: Vec<SourceStatus>,
    pub cache: Option<CacheStoreStatus>,
    pub latest_snapshot: Option<PathBuf>,
    pub synthetic_available: bool,
}

pub struct FallbackOrchestrator {
    store: Arc<DurableCacheStore>,
    budget: Arc<CallBudgetTracker>,
    sources: Vec<Arc<dyn StockSource>>,
    snapshot_dir: PathBuf,
    clock: Arc<dyn Clock>,
    freshness_hours: u32,
}

impl FallbackOrchestrator {
    /// `sources` are tried in the given order.
    pub fn new(
        store: Arc<DurableCacheStore>,
        budget: Arc<CallBudgetTracker>,
        sources: Vec<Arc<dyn StockSource>>,
        snapshot_dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            budget,
            sources,
            snapshot_dir: snapshot_dir.into(),
            clock,
            freshness_hours: DEFAULT_MAX_AGE_HOURS,
        }
    }

    #[must_use]
    pub fn with_freshness_hours(mut self, hours: u32) -> Self {
        self.freshness_hours = hours;
        self
    }

    pub fn store(&self) -> &DurableCacheStore {
        &self.store
    }

    pub fn budget(&self) -> &CallBudgetTracker {
        &self.budget
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Data for `tickers` from the first tier that can serve it.
    ///
    /// Only a failure of the synthetic tier is returned as an error.
    pub async fn get_stock_data<S: AsRef<str>>(
        &self,
        tickers: &[S],
        force_refresh: bool,
    ) -> Result<Dataset, CoreError> {
        let (tickers, rejected) = Ticker::parse_list(tickers);
        let mut warnings = rejected
            .into_iter()
            .map(|(input, error)| {
                tracing::warn!(input = %input, error = %error, "dropping invalid ticker");
                format!("ignored ticker '{input}': {error}")
            })
            .collect::<Vec<_>>();

        if tickers.is_empty() {
            tracing::warn!("no valid tickers requested");
            let dataset = synthetic::generate(&[], self.clock.now())?;
            return Ok(enrich(dataset.with_warnings(warnings)));
        }

        let mut outcomes = Vec::new();
        if force_refresh {
            tracing::info!("force refresh requested; serving from cache tiers");
        } else {
            outcomes.push((Tier::Live, self.live_tier(&tickers).await));
        }
        if !matches!(outcomes.last(), Some((_, TierOutcome::Success(_)))) {
            outcomes.push((Tier::Cache, self.cache_tier(&tickers)));
        }
        if !matches!(outcomes.last(), Some((_, TierOutcome::Success(_)))) {
            outcomes.push((Tier::Snapshot, self.snapshot_tier(&tickers)));
        }

        let mut selected = None;
        for (tier, outcome) in outcomes {
            match outcome {
                TierOutcome::Success(dataset) => selected = Some(dataset),
                TierOutcome::Empty => {
                    tracing::debug!(tier = %tier, "tier had no data");
                }
                TierOutcome::Failed(reason) => {
                    tracing::warn!(tier = %tier, reason = %reason, "tier failed");
                    warnings.push(format!("{tier} tier failed: {reason}"));
                }
            }
        }

        let dataset = match selected {
            Some(dataset) => dataset,
            None => {
                tracing::warn!(count = tickers.len(), "falling back to synthetic data");
                synthetic::generate(&tickers, self.clock.now())?
            }
        };

        tracing::info!(
            tier = %dataset.tier,
            provenance = %dataset.provenance,
            count = dataset.len(),
            "serving stock data"
        );
        Ok(enrich(dataset.with_warnings(warnings)))
    }

    /// Per-source availability and budget plus cache and snapshot state.
    pub fn get_system_status(&self) -> SystemStatus {
        let sources = self
            .sources
            .iter()
            .map(|source| {
                let id = source.id();
                let budget = match self.budget.state(id) {
                    Ok(state) => Some(state),
                    Err(error) => {
                        tracing::warn!(source = %id, error = %error, "budget state unavailable");
                        None
                    }
                };
                SourceStatus {
                    source: id,
                    description: source.description(),
                    available: source.is_available(),
                    can_call_today: self.budget.can_call_today(id),
                    budget,
                }
            })
            .collect();

        let cache = match self.store.status() {
            Ok(status) => Some(status),
            Err(error) => {
                tracing::warn!(error = %error, "cache status unavailable");
                None
            }
        };

        SystemStatus {
            generated_at: self.clock.now(),
            sources,
            cache,
            latest_snapshot: snapshot::latest_snapshot(&self.snapshot_dir),
            synthetic_available: true,
        }
    }

    async fn live_tier(&self, tickers: &[Ticker]) -> TierOutcome {
        let mut failures = Vec::new();

        for source in &self.sources {
            let id = source.id();
            if !source.is_available() {
                tracing::debug!(source = %id, "source not available; skipping");
                continue;
            }
            if !self.budget.can_call_today(id) {
                tracing::info!(source = %id, "daily call budget used; skipping");
                continue;
            }

            if let Err(error) = self.budget.record_call(id) {
                tracing::error!(source = %id, error = %error, "failed to record call");
            }
            tracing::info!(source = %id, count = tickers.len(), "fetching live data");
            let batch = source.fetch_batch(tickers).await;

            if batch.is_empty() {
                tracing::warn!(source = %id, failed = batch.failures.len(), "source returned no data");
                failures.push(format!("{id} returned no records"));
                continue;
            }

            if let Err(error) = self.budget.record_success(id) {
                tracing::error!(source = %id, error = %error, "failed to record success");
            }
            self.persist(id, &batch.records);

            let mut warnings = std::mem::take(&mut failures);
            warnings.extend(
                batch
                    .failures
                    .iter()
                    .map(|(ticker, error)| format!("{ticker} not available from {id}: {error}")),
            );
            return TierOutcome::Success(
                Dataset::new(DataSource::Live(id), batch.records).with_warnings(warnings),
            );
        }

        if failures.is_empty() {
            TierOutcome::Empty
        } else {
            TierOutcome::Failed(failures.join("; "))
        }
    }

    /// Store first, then the CSV snapshot; both best effort.
    fn persist(&self, source: SourceId, records: &[StockRecord]) {
        self.store.put_batch(source, records);
        if let Err(error) = snapshot::write_snapshot(&self.snapshot_dir, self.clock.today(), records) {
            tracing::warn!(source = %source, error = %error, "failed to write csv snapshot");
        }
    }

    fn cache_tier(&self, tickers: &[Ticker]) -> TierOutcome {
        let records = self.store.get_many(tickers, self.freshness_hours);
        retagged(records, DataSource::Cache)
    }

    fn snapshot_tier(&self, tickers: &[Ticker]) -> TierOutcome {
        match snapshot::load_latest(&self.snapshot_dir, tickers) {
            Ok(records) => retagged(records, DataSource::Snapshot),
            Err(error) => TierOutcome::Failed(error.to_string()),
        }
    }
}

fn retagged(records: Vec<StockRecord>, provenance: DataSource) -> TierOutcome {
    if records.is_empty() {
        return TierOutcome::Empty;
    }
    let records = records
        .into_iter()
        .map(|record| record.retagged(provenance))
        .collect();
    TierOutcome::Success(Dataset::new(provenance, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http_client::testing::CannedHttpClient;
    use stockdigest_warehouse::{Warehouse, WarehouseConfig};

    fn orchestrator(temp: &tempfile::TempDir, sources: Vec<Arc<dyn StockSource>>) -> FallbackOrchestrator {
        let config = WarehouseConfig::for_home(temp.path());
        let cache_dir = config.cache_dir();
        let warehouse = Warehouse::open(config).expect("open");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            UtcDateTime::parse("2026-03-02T12:00:00Z").expect("timestamp"),
        ));
        FallbackOrchestrator::new(
            Arc::new(DurableCacheStore::new(warehouse.clone(), Arc::clone(&clock))),
            Arc::new(CallBudgetTracker::new(warehouse, Arc::clone(&clock))),
            sources,
            cache_dir,
            clock,
        )
    }

    #[test]
    fn offline_chain_keeps_sources_but_reports_them_unavailable() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let sources = SourceChainBuilder::new()
            .with_alpha_vantage_key("key")
            .with_offline(true)
            .build(Arc::new(CannedHttpClient::default()), clock);

        let ids = sources.iter().map(|source| source.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![SourceId::YahooFinance, SourceId::AlphaVantage]);
        assert!(sources.iter().all(|source| !source.is_available()));
    }

    #[tokio::test]
    async fn empty_request_yields_empty_synthetic_dataset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(&temp, Vec::new());

        let dataset = orchestrator
            .get_stock_data::<&str>(&[], false)
            .await
            .expect("dataset");
        assert_eq!(dataset.provenance, DataSource::Synthetic);
        assert!(dataset.is_empty());
    }

    #[tokio::test]
    async fn invalid_tickers_are_dropped_with_a_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(&temp, Vec::new());

        let dataset = orchestrator
            .get_stock_data(&["aapl", "1BAD", "AAPL"], false)
            .await
            .expect("dataset");
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].ticker.as_str(), "AAPL");
        assert!(dataset.warnings.iter().any(|warning| warning.contains("1BAD")));
    }

    #[test]
    fn status_lists_every_source_with_budget() {
        let temp = tempfile::tempdir().expect("tempdir");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let sources = SourceChainBuilder::new()
            .with_yahoo_enabled(false)
            .build(Arc::new(CannedHttpClient::default()), clock);
        let orchestrator = orchestrator(&temp, sources);

        let status = orchestrator.get_system_status();
        assert_eq!(status.sources.len(), 2);
        assert!(status.sources.iter().all(|source| !source.available));
        assert!(status.sources.iter().all(|source| source.can_call_today));
        assert!(status.synthetic_available);
        assert!(status.latest_snapshot.is_none());
        assert_eq!(status.cache.expect("cache status").latest_index_len, 0);
    }
}
