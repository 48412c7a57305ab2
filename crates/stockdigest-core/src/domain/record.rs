use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::Date;

use super::timestamp::cache_date_serde;
use super::{Ticker, UtcDateTime};
use crate::source::{DataSource, Tier};

/// One stock's data as produced by a single tier.
///
/// Identity and provenance are always present; every market field is optional
/// and stays absent until a source or the enrichment stage fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: Ticker,
    pub data_source: DataSource,
    pub collected_at: UtcDateTime,
    #[serde(with = "cache_date_serde")]
    pub cache_date: Date,
    #[serde(flatten)]
    pub metrics: StockMetrics,
}

impl StockRecord {
    /// Empty record collected at `collected_at`, keyed under that UTC day.
    pub fn new(ticker: Ticker, data_source: DataSource, collected_at: UtcDateTime) -> Self {
        Self {
            ticker,
            data_source,
            collected_at,
            cache_date: collected_at.date(),
            metrics: StockMetrics::default(),
        }
    }

    /// Copy of this record carrying a different provenance tag.
    #[must_use]
    pub fn retagged(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }
}

/// Market-cap bucket derived during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketCapCategory {
    #[serde(rename = "Small Cap")]
    Small,
    #[serde(rename = "Mid Cap")]
    Mid,
    #[serde(rename = "Large Cap")]
    Large,
    #[serde(rename = "Mega Cap")]
    Mega,
}

impl MarketCapCategory {
    /// Right-inclusive bins; `None` for non-positive or non-finite caps.
    pub fn from_market_cap(market_cap: f64) -> Option<Self> {
        if !market_cap.is_finite() || market_cap <= 0.0 {
            return None;
        }
        let category = if market_cap <= 2e9 {
            Self::Small
        } else if market_cap <= 10e9 {
            Self::Mid
        } else if market_cap <= 100e9 {
            Self::Large
        } else {
            Self::Mega
        };
        Some(category)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "Small Cap",
            Self::Mid => "Mid Cap",
            Self::Large => "Large Cap",
            Self::Mega => "Mega Cap",
        }
    }
}

impl Display for MarketCapCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional market fields of a [`StockRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_52w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_52w: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_volume_30d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float_shares: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_pe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ps_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ev_ebitda: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_to_equity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_to_assets: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_cash_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_cash_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_income_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_margin: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebitda_margins: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earnings_growth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps_growth: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_turnover: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_eps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_analysts: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_30d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_90d: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_ask_spread: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_short: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_short_prev_month: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_momentum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap_category: Option<MarketCapCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_ratio_calculated: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_completeness_pct: Option<f64>,
}

/// Identity and provenance columns, always present.
pub const KEY_COLUMNS: &[&str] = &["ticker", "data_source", "collected_at", "cache_date"];

/// Columns holding text rather than numbers.
pub const TEXT_COLUMNS: &[&str] = &[
    "ticker",
    "data_source",
    "collected_at",
    "cache_date",
    "company_name",
    "sector",
    "industry",
    "recommendation_key",
    "market_cap_category",
];

/// Market fields counted by the completeness score, in column order.
pub const DATA_FIELDS: &[&str] = &[
    "company_name",
    "sector",
    "industry",
    "current_price",
    "change",
    "change_percent",
    "high_52w",
    "low_52w",
    "open",
    "day_high",
    "day_low",
    "prev_close",
    "volume",
    "avg_volume_30d",
    "average_volume",
    "volume_ratio",
    "market_cap",
    "enterprise_value",
    "shares_outstanding",
    "float_shares",
    "pe_ratio",
    "forward_pe",
    "peg_ratio",
    "pb_ratio",
    "ps_ratio",
    "ev_ebitda",
    "debt_to_equity",
    "debt_to_assets",
    "current_ratio",
    "quick_ratio",
    "free_cash_flow",
    "operating_cash_flow",
    "interest_income_ratio",
    "profit_margin",
    "operating_margin",
    "gross_margin",
    "ebitda_margins",
    "revenue_growth",
    "earnings_growth",
    "eps_growth",
    "roe",
    "roa",
    "roic",
    "asset_turnover",
    "eps",
    "forward_eps",
    "book_value",
    "dividend_rate",
    "dividend_yield",
    "payout_ratio",
    "recommendation_mean",
    "recommendation_key",
    "target_price",
    "target_high",
    "target_low",
    "number_of_analysts",
    "trend_30d",
    "trend_90d",
    "rsi",
    "volatility",
    "beta",
    "bid_ask_spread",
    "short_ratio",
    "shares_short",
    "shares_short_prev_month",
    "price_momentum",
    "market_cap_category",
    "peg_ratio_calculated",
];

/// Column name of the completeness score.
pub const COMPLETENESS_FIELD: &str = "data_completeness_pct";

/// Every serialized column in snapshot order.
pub fn all_columns() -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(KEY_COLUMNS.len() + DATA_FIELDS.len() + 1);
    columns.extend_from_slice(KEY_COLUMNS);
    columns.extend_from_slice(DATA_FIELDS);
    columns.push(COMPLETENESS_FIELD);
    columns
}

/// Result of one fallback tier: a single-provenance batch plus any warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub provenance: DataSource,
    pub tier: Tier,
    pub records: Vec<StockRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Dataset {
    pub fn new(provenance: DataSource, records: Vec<StockRecord>) -> Self {
        Self {
            provenance,
            tier: provenance.tier(),
            records,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, ticker: &str) -> Option<&StockRecord> {
        self.records
            .iter()
            .find(|record| record.ticker.as_str() == ticker)
    }
}

/// Outcome of one tier attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Success(Dataset),
    Empty,
    Failed(String),
}
