//! Behavior-driven tests for the enrichment stage
//!
//! These tests verify HOW datasets are normalized before they reach callers:
//! derived ratios, required defaults and completeness, whatever the tier.

use stockdigest_core::enrich::REQUIRED_DEFAULTS;
use stockdigest_core::{
    enrich, synthetic, DataSource, Dataset, MarketCapCategory, SourceId, StockRecord, Ticker,
    UtcDateTime,
};

fn collected_at() -> UtcDateTime {
    UtcDateTime::parse("2026-03-02T15:45:00Z").expect("timestamp")
}

fn sparse_record(symbol: &str) -> StockRecord {
    let mut record = StockRecord::new(
        Ticker::parse(symbol).expect("ticker"),
        DataSource::Live(SourceId::AlphaVantage),
        collected_at(),
    );
    record.metrics.current_price = Some(52.3);
    record.metrics.prev_close = Some(50.0);
    record.metrics.market_cap = Some(8.5e9);
    record
}

fn field(record: &StockRecord, name: &str) -> serde_json::Value {
    serde_json::to_value(record)
        .expect("serialize")
        .get(name)
        .cloned()
        .unwrap_or(serde_json::Value::Null)
}

// =============================================================================
// Enrichment: Idempotence
// =============================================================================

#[test]
fn when_a_sparse_dataset_is_enriched_twice_the_second_pass_changes_nothing() {
    // Given: A live dataset with only a few fields populated
    let dataset = Dataset::new(
        DataSource::Live(SourceId::AlphaVantage),
        vec![sparse_record("AAPL"), sparse_record("MSFT")],
    );

    // When: It is enriched once and then again
    let once = enrich(dataset);
    let twice = enrich(once.clone());

    // Then: Both passes agree field for field
    assert_eq!(once, twice);
}

#[test]
fn when_every_required_field_is_already_present_enrichment_is_still_stable() {
    // Given: A synthetic dataset, which populates nearly every field
    let tickers = ["NVDA", "ZZZZ"]
        .into_iter()
        .map(|symbol| Ticker::parse(symbol).expect("ticker"))
        .collect::<Vec<_>>();
    let dataset = synthetic::generate(&tickers, collected_at()).expect("synthetic");

    // Then: enrich(enrich(d)) == enrich(d)
    let once = enrich(dataset);
    assert_eq!(enrich(once.clone()), once);
}

// =============================================================================
// Enrichment: Defaults and Derived Fields
// =============================================================================

#[test]
fn when_required_fields_are_missing_documented_defaults_fill_them() {
    // Given: A record with no required fields
    let dataset = Dataset::new(
        DataSource::Cache,
        vec![StockRecord::new(
            Ticker::parse("ZZZZ").expect("ticker"),
            DataSource::Cache,
            collected_at(),
        )],
    );

    // When: The dataset is enriched
    let enriched = enrich(dataset);
    let record = &enriched.records[0];

    // Then: Every required field holds its default
    for (name, default) in REQUIRED_DEFAULTS {
        assert_eq!(field(record, name).as_f64(), Some(*default), "{name}");
    }
    assert_eq!(record.data_source, DataSource::Cache);
}

#[test]
fn when_prices_and_market_cap_are_known_derived_fields_follow_them() {
    // Given: A record with a price move and a mid-sized market cap
    let enriched = enrich(Dataset::new(
        DataSource::Live(SourceId::AlphaVantage),
        vec![sparse_record("AMD")],
    ));
    let metrics = &enriched.records[0].metrics;

    // Then: Momentum, bucket and completeness are derived
    let momentum = metrics.price_momentum.expect("momentum");
    assert!((momentum - 4.6).abs() < 1e-9, "momentum was {momentum}");
    assert_eq!(metrics.market_cap_category, Some(MarketCapCategory::Mid));
    assert_eq!(metrics.volume_ratio, Some(1.0));

    let completeness = metrics.data_completeness_pct.expect("completeness");
    assert!(completeness > 0.0 && completeness < 100.0);
}

#[test]
fn when_a_dataset_is_enriched_provenance_and_warnings_are_untouched() {
    // Given: A snapshot dataset carrying a warning
    let dataset = Dataset::new(DataSource::Snapshot, vec![sparse_record("AAPL").retagged(DataSource::Snapshot)])
        .with_warnings(vec![String::from("yahoo_finance returned no records")]);

    // Then: Only record fields change
    let enriched = enrich(dataset);
    assert_eq!(enriched.provenance, DataSource::Snapshot);
    assert_eq!(enriched.warnings, vec!["yahoo_finance returned no records"]);
    assert!(enriched
        .records
        .iter()
        .all(|record| record.data_source == DataSource::Snapshot));
}
