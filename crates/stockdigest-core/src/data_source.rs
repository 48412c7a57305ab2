//! Source adapter contract.
//!
//! Every upstream provider implements [`StockSource`]. A fetch never fails the
//! whole batch: a ticker either yields a record or a [`SourceError`] describing
//! why it is not available, and the batch moves on to the next ticker.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::domain::{StockRecord, Ticker};
use crate::source::SourceId;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidResponse,
    NotFound,
    Internal,
}

/// Why a ticker could not be fetched from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Result of fetching one ticker.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Record(Box<StockRecord>),
    NotAvailable(SourceError),
}

impl From<Result<StockRecord, SourceError>> for FetchOutcome {
    fn from(value: Result<StockRecord, SourceError>) -> Self {
        match value {
            Ok(record) => Self::Record(Box::new(record)),
            Err(error) => Self::NotAvailable(error),
        }
    }
}

/// Records and per-ticker failures from one adapter batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub records: Vec<StockRecord>,
    pub failures: Vec<(Ticker, SourceError)>,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Upstream stock data provider.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](StockSource::id) | Provider identifier, also the persisted cache key |
/// | [`is_available`](StockSource::is_available) | Static capability check (credentials, configuration) |
/// | [`fetch`](StockSource::fetch) | Fetch one ticker, applying the adapter's own pacing |
/// | [`fetch_batch`](StockSource::fetch_batch) | Fetch tickers one after another |
pub trait StockSource: Send + Sync {
    fn id(&self) -> SourceId;

    fn is_available(&self) -> bool;

    fn description(&self) -> &'static str {
        self.id().description()
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>>;

    /// Fetch `tickers` sequentially; a failed ticker never stops the batch.
    fn fetch_batch<'a>(
        &'a self,
        tickers: &'a [Ticker],
    ) -> Pin<Box<dyn Future<Output = BatchResult> + Send + 'a>> {
        Box::pin(async move {
            let mut batch = BatchResult::default();
            for ticker in tickers {
                match self.fetch(ticker).await {
                    FetchOutcome::Record(record) => batch.records.push(*record),
                    FetchOutcome::NotAvailable(error) => {
                        tracing::warn!(
                            source = %self.id(),
                            ticker = %ticker,
                            code = error.code(),
                            error = %error.message(),
                            "ticker not available"
                        );
                        batch.failures.push((ticker.clone(), error));
                    }
                }
            }

            tracing::info!(
                source = %self.id(),
                count = batch.records.len(),
                failed = batch.failures.len(),
                "adapter batch finished"
            );
            batch
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(SourceError::unavailable("x").code(), "source.unavailable");
        assert_eq!(SourceError::rate_limited("x").code(), "source.rate_limited");
        assert_eq!(
            SourceError::invalid_response("x").code(),
            "source.invalid_response"
        );
        assert_eq!(SourceError::not_found("x").code(), "source.not_found");
        assert!(SourceError::rate_limited("x").retryable());
        assert!(!SourceError::not_found("x").retryable());
    }

    #[test]
    fn display_includes_code() {
        let error = SourceError::not_found("no quote for ZZZZ");
        assert_eq!(error.to_string(), "no quote for ZZZZ (source.not_found)");
    }
}
