//! Enrichment Stage.
//!
//! Normalizes every dataset the orchestrator returns, whichever tier produced
//! it. The transformation is pure and idempotent:
//!
//! 1. derived ratios (volume ratio, price momentum, market-cap bucket, PEG)
//! 2. documented defaults for the required fields
//! 3. `data_completeness_pct`
//!
//! Derivations read the same defaults step 2 writes, so a second pass
//! recomputes identical values.

use crate::domain::{
    Dataset, MarketCapCategory, StockMetrics, StockRecord, COMPLETENESS_FIELD, DATA_FIELDS,
};

/// Required fields and the value written when a record lacks them.
pub const REQUIRED_DEFAULTS: &[(&str, f64)] = &[
    ("debt_to_equity", 1.0),
    ("free_cash_flow", 0.0),
    ("interest_income_ratio", 0.0),
    ("volume", 1_000_000.0),
    ("average_volume", 1_000_000.0),
    ("bid_ask_spread", 0.01),
    ("shares_outstanding", 10_000_000.0),
    ("trend_30d", 0.0),
    ("trend_90d", 0.0),
    ("rsi", 50.0),
    ("volatility", 0.2),
    ("eps", 1.0),
    ("eps_growth", 0.1),
    ("revenue_growth", 0.1),
    ("profit_margin", 0.15),
    ("pe_ratio", 20.0),
    ("pb_ratio", 2.0),
    ("roe", 0.15),
];

const DEFAULT_VOLUME: f64 = 1_000_000.0;
const DEFAULT_PE_RATIO: f64 = 20.0;
const DEFAULT_EPS_GROWTH: f64 = 0.1;

pub fn enrich(mut dataset: Dataset) -> Dataset {
    for record in &mut dataset.records {
        enrich_record(record);
    }
    tracing::debug!(
        provenance = %dataset.provenance,
        count = dataset.records.len(),
        "enriched dataset"
    );
    dataset
}

pub fn enrich_record(record: &mut StockRecord) {
    add_derived_fields(&mut record.metrics);
    fill_required_defaults(&mut record.metrics);
    record.metrics.data_completeness_pct = Some(completeness_pct(&record.metrics));
}

fn add_derived_fields(metrics: &mut StockMetrics) {
    metrics.volume_ratio = Some(match metrics.avg_volume_30d {
        Some(average) => {
            let denominator = if average == 0.0 { 1.0 } else { average };
            metrics.volume.unwrap_or(DEFAULT_VOLUME) / denominator
        }
        None => 1.0,
    });

    metrics.price_momentum = Some(match (metrics.current_price, metrics.prev_close) {
        (Some(current), Some(previous)) if previous != 0.0 => (current - previous) / previous * 100.0,
        _ => 0.0,
    });

    metrics.market_cap_category = metrics
        .market_cap
        .and_then(MarketCapCategory::from_market_cap);

    let growth_pct = metrics.eps_growth.unwrap_or(DEFAULT_EPS_GROWTH) * 100.0;
    let denominator = if growth_pct == 0.0 { 1.0 } else { growth_pct };
    metrics.peg_ratio_calculated =
        Some(metrics.pe_ratio.unwrap_or(DEFAULT_PE_RATIO) / denominator);
}

fn fill_required_defaults(metrics: &mut StockMetrics) {
    for (field, default) in REQUIRED_DEFAULTS {
        if let Some(slot) = required_slot(metrics, field) {
            slot.get_or_insert(*default);
        }
    }
}

fn required_slot<'a>(metrics: &'a mut StockMetrics, field: &str) -> Option<&'a mut Option<f64>> {
    let slot = match field {
        "debt_to_equity" => &mut metrics.debt_to_equity,
        "free_cash_flow" => &mut metrics.free_cash_flow,
        "interest_income_ratio" => &mut metrics.interest_income_ratio,
        "volume" => &mut metrics.volume,
        "average_volume" => &mut metrics.average_volume,
        "bid_ask_spread" => &mut metrics.bid_ask_spread,
        "shares_outstanding" => &mut metrics.shares_outstanding,
        "trend_30d" => &mut metrics.trend_30d,
        "trend_90d" => &mut metrics.trend_90d,
        "rsi" => &mut metrics.rsi,
        "volatility" => &mut metrics.volatility,
        "eps" => &mut metrics.eps,
        "eps_growth" => &mut metrics.eps_growth,
        "revenue_growth" => &mut metrics.revenue_growth,
        "profit_margin" => &mut metrics.profit_margin,
        "pe_ratio" => &mut metrics.pe_ratio,
        "pb_ratio" => &mut metrics.pb_ratio,
        "roe" => &mut metrics.roe,
        _ => return None,
    };
    Some(slot)
}

/// Share of [`DATA_FIELDS`] that are populated, as a percentage.
pub fn completeness_pct(metrics: &StockMetrics) -> f64 {
    let populated = match serde_json::to_value(metrics) {
        Ok(serde_json::Value::Object(fields)) => DATA_FIELDS
            .iter()
            .filter(|field| **field != COMPLETENESS_FIELD)
            .filter(|field| fields.get(**field).is_some_and(|value| !value.is_null()))
            .count(),
        Ok(_) => 0,
        Err(error) => {
            tracing::warn!(error = %error, "failed to measure record completeness");
            0
        }
    };

    let pct = populated as f64 / DATA_FIELDS.len() as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
