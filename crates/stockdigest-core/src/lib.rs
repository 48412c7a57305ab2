//! # Stockdigest Core
//!
//! Daily stock-data cache and multi-source fallback chain.
//!
//! ## Overview
//!
//! Upstream providers are slow, rate limited and sometimes down. This crate
//! keeps a durable once-per-day cache of what they returned and serves every
//! request from the best tier available:
//!
//! - **Live adapters** (Yahoo Finance, Alpha Vantage) under a per-source daily
//!   call budget
//! - **Durable cache** of records keyed by ticker, source and UTC day
//! - **CSV snapshots** written after each live batch
//! - **Synthetic data** as the tier that never fails
//!
//! Every dataset carries a single provenance tag and is enriched with derived
//! ratios and documented defaults before it reaches the caller.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo Finance and Alpha Vantage adapters |
//! | [`budget`] | Per-source daily call budget |
//! | [`cache`] | Durable cache store |
//! | [`circuit_breaker`] | Circuit breaker for upstream calls |
//! | [`clock`] | Injectable wall clock |
//! | [`config`] | Environment configuration |
//! | [`data_source`] | Adapter trait and per-ticker outcomes |
//! | [`domain`] | Tickers, records, datasets and timestamps |
//! | [`enrich`] | Enrichment stage |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`metadata`] | JSON mirror of cache metadata and budgets |
//! | [`orchestrator`] | Fallback orchestrator |
//! | [`pacing`] | Inter-call pacing for rate-limited providers |
//! | [`snapshot`] | Daily CSV snapshots |
//! | [`source`] | Source identifiers and provenance tags |
//! | [`synthetic`] | Deterministic placeholder data |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  CLI / caller        │
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────┐
//! │ FallbackOrchestrator │────▶│ CallBudgetTracker│
//! └──────────┬───────────┘     └──────────────────┘
//!            ▼
//!   live ─▶ cache ─▶ snapshot ─▶ synthetic
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ Enrichment           │
//! └──────────────────────┘
//! ```

pub mod adapters;
pub mod budget;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod enrich;
pub mod error;
pub mod http_client;
pub mod metadata;
pub mod orchestrator;
pub mod pacing;
pub mod snapshot;
pub mod source;
pub mod synthetic;

pub use adapters::{AlphaVantageAdapter, YahooAdapter};
pub use budget::{CallBudgetTracker, SourceBudgetState, DEFAULT_MAX_DAILY_CALLS};
pub use cache::{CacheStoreStatus, DurableCacheStore, DEFAULT_CLEANUP_DAYS, DEFAULT_MAX_AGE_HOURS};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DigestConfig;
pub use data_source::{BatchResult, FetchOutcome, SourceError, SourceErrorKind, StockSource};
pub use domain::{
    Dataset, MarketCapCategory, StockMetrics, StockRecord, Ticker, TierOutcome, UtcDateTime,
};
pub use enrich::{enrich, enrich_record};
pub use error::{CoreError, ValidationError};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use metadata::{CacheMetadata, MetadataMirror};
pub use orchestrator::{FallbackOrchestrator, SourceChainBuilder, SourceStatus, SystemStatus};
pub use pacing::{CallPacer, PacingPolicy};
pub use source::{DataSource, SourceId, Tier};

pub use stockdigest_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
