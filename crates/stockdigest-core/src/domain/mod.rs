//! # Domain Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Validated, uppercase equity ticker |
//! | [`StockRecord`] | One stock's fields from a single tier |
//! | [`StockMetrics`] | Optional market fields of a record |
//! | [`Dataset`] | Single-provenance batch returned to callers |
//! | [`TierOutcome`] | Success / empty / failed result of one tier |
//! | [`UtcDateTime`] | UTC timestamp |

mod record;
mod ticker;
mod timestamp;

pub use record::{
    all_columns, Dataset, MarketCapCategory, StockMetrics, StockRecord, TierOutcome,
    COMPLETENESS_FIELD, DATA_FIELDS, KEY_COLUMNS, TEXT_COLUMNS,
};
pub use ticker::Ticker;
pub use timestamp::{
    format_cache_date, format_compact_date, parse_cache_date, UtcDateTime,
};
