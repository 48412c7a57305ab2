//! Call-Budget Tracker.
//!
//! Answers "may this source be called today?" and records calls and successes.
//! State lives in the warehouse `source_budget` table and is mirrored to
//! `cache_metadata.json` after every mutation.
//!
//! The tracker is advisory: the orchestrator checks [`CallBudgetTracker::can_call_today`]
//! before calling and records afterwards. That check-then-act pair assumes a
//! single writer per cache directory; the increment itself is transactional, so
//! concurrent recorders never lose a count.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stockdigest_warehouse::{BudgetRow, CallStamp, Warehouse};

use crate::clock::Clock;
use crate::domain::{format_cache_date, UtcDateTime};
use crate::error::CoreError;
use crate::metadata::MetadataMirror;
use crate::source::SourceId;

pub const DEFAULT_MAX_DAILY_CALLS: u32 = 1;

/// Budget state of one source as observed today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBudgetState {
    pub source: String,
    pub last_call_timestamp: Option<UtcDateTime>,
    pub daily_call_count: u32,
    pub max_daily_calls: u32,
    pub last_successful_update: Option<UtcDateTime>,
}

impl SourceBudgetState {
    /// State of a source that was never called.
    pub fn untouched(source: SourceId, max_daily_calls: u32) -> Self {
        Self {
            source: source.as_str().to_string(),
            last_call_timestamp: None,
            daily_call_count: 0,
            max_daily_calls,
            last_successful_update: None,
        }
    }

    pub fn from_row(row: &BudgetRow) -> Self {
        let timestamp = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|value| UtcDateTime::parse(value).ok())
        };

        Self {
            source: row.source.clone(),
            last_call_timestamp: timestamp(&row.last_call_at),
            daily_call_count: u32::try_from(row.daily_call_count).unwrap_or(u32::MAX),
            max_daily_calls: u32::try_from(row.max_daily_calls).unwrap_or(0),
            last_successful_update: timestamp(&row.last_success_at),
        }
    }

    pub fn has_budget(&self) -> bool {
        self.daily_call_count < self.max_daily_calls
    }
}

pub struct CallBudgetTracker {
    warehouse: Warehouse,
    clock: Arc<dyn Clock>,
    mirror: MetadataMirror,
    default_max_daily_calls: u32,
}

impl CallBudgetTracker {
    pub fn new(warehouse: Warehouse, clock: Arc<dyn Clock>) -> Self {
        let mirror = MetadataMirror::new(warehouse.clone());
        Self {
            warehouse,
            clock,
            mirror,
            default_max_daily_calls: DEFAULT_MAX_DAILY_CALLS,
        }
    }

    /// Limit applied to sources that have no budget row yet.
    #[must_use]
    pub fn with_default_max_daily_calls(mut self, max_daily_calls: u32) -> Self {
        self.default_max_daily_calls = max_daily_calls;
        self
    }

    /// Apply a configured limit to every known source, overriding limits
    /// persisted by earlier runs, and use it for sources added later.
    pub fn with_configured_max_daily_calls(self, max_daily_calls: u32) -> Result<Self, CoreError> {
        let tracker = self.with_default_max_daily_calls(max_daily_calls);
        for source in SourceId::ALL {
            tracker.set_max_daily_calls(source, max_daily_calls)?;
        }
        tracing::debug!(max = max_daily_calls, "applied configured daily call limit");
        Ok(tracker)
    }

    pub fn default_max_daily_calls(&self) -> u32 {
        self.default_max_daily_calls
    }

    /// Whether `source` may be called today.
    ///
    /// Unknown sources may always be called. A count left over from a prior
    /// calendar day is reset (and persisted) first. Storage failures answer
    /// `false`: under-calling is preferred to over-calling.
    pub fn can_call_today(&self, source: SourceId) -> bool {
        match self.current_row(source) {
            Ok(None) => true,
            Ok(Some(row)) => SourceBudgetState::from_row(&row).has_budget(),
            Err(error) => {
                tracing::warn!(source = %source, error = %error, "budget state unreadable; treating source as exhausted");
                false
            }
        }
    }

    /// Record one call attempt: stamp the time and increment today's count.
    pub fn record_call(&self, source: SourceId) -> Result<SourceBudgetState, CoreError> {
        let now = self.clock.now();
        let at = now.format_rfc3339();
        let date = format_cache_date(now.date());
        let row = self.warehouse.record_call(
            source.as_str(),
            CallStamp {
                at: &at,
                at_ms: now.unix_millis(),
                date: &date,
            },
            i64::from(self.default_max_daily_calls),
        )?;
        self.mirror.refresh();

        let state = SourceBudgetState::from_row(&row);
        tracing::info!(
            source = %source,
            count = state.daily_call_count,
            max = state.max_daily_calls,
            "recorded upstream call"
        );
        Ok(state)
    }

    /// Stamp the last successful update; independent of call recording.
    pub fn record_success(&self, source: SourceId) -> Result<SourceBudgetState, CoreError> {
        let at = self.clock.now().format_rfc3339();
        let row = self.warehouse.record_success(
            source.as_str(),
            &at,
            i64::from(self.default_max_daily_calls),
        )?;
        self.mirror.refresh();
        Ok(SourceBudgetState::from_row(&row))
    }

    pub fn set_max_daily_calls(&self, source: SourceId, max_daily_calls: u32) -> Result<(), CoreError> {
        self.warehouse
            .set_max_daily_calls(source.as_str(), i64::from(max_daily_calls))?;
        self.mirror.refresh();
        Ok(())
    }

    /// Today's state of `source`, applying any pending day rollover.
    pub fn state(&self, source: SourceId) -> Result<SourceBudgetState, CoreError> {
        Ok(match self.current_row(source)? {
            Some(row) => SourceBudgetState::from_row(&row),
            None => SourceBudgetState::untouched(source, self.default_max_daily_calls),
        })
    }

    /// State of every known source, in priority order.
    pub fn states(&self) -> Result<Vec<SourceBudgetState>, CoreError> {
        SourceId::ALL
            .iter()
            .map(|source| self.state(*source))
            .collect()
    }

    /// Budget row with the day-rollover reset applied.
    fn current_row(&self, source: SourceId) -> Result<Option<BudgetRow>, CoreError> {
        let today = format_cache_date(self.clock.today());
        if self.warehouse.reset_daily_count(source.as_str(), &today)? {
            tracing::info!(source = %source, today = %today, "daily call count reset");
            self.mirror.refresh();
        }
        Ok(self.warehouse.budget_row(source.as_str())?)
    }
}
