//! Behavior-driven tests for the daily call budget
//!
//! These tests verify HOW the budget tracker gates upstream calls across a
//! calendar day, a day rollover and a process restart.

use std::sync::Arc;

use stockdigest_core::metadata::{CacheMetadata, METADATA_FILE_NAME};
use stockdigest_core::{
    CallBudgetTracker, ManualClock, SourceId, UtcDateTime, Warehouse, WarehouseConfig,
};
use stockdigest_tests::clock_at;
use tempfile::{tempdir, TempDir};
use time::Duration;

fn open_tracker(temp: &TempDir, clock: Arc<ManualClock>) -> CallBudgetTracker {
    let warehouse = Warehouse::open(WarehouseConfig::for_home(temp.path())).expect("warehouse open");
    CallBudgetTracker::new(warehouse, clock)
}

fn morning() -> Arc<ManualClock> {
    clock_at("2026-03-02T08:15:00Z")
}

// =============================================================================
// Budget: Once Per Day
// =============================================================================

#[test]
fn when_a_source_was_called_today_it_cannot_be_called_again_until_tomorrow() {
    // Given: A fresh tracker with the default budget of one call per day
    let temp = tempdir().expect("tempdir");
    let clock = morning();
    let tracker = open_tracker(&temp, clock.clone());
    assert!(tracker.can_call_today(SourceId::YahooFinance));

    // When: One call is recorded
    let state = tracker
        .record_call(SourceId::YahooFinance)
        .expect("record call");
    assert_eq!(state.daily_call_count, 1);

    // Then: Two checks on the same day both refuse
    assert!(!tracker.can_call_today(SourceId::YahooFinance));
    clock.advance(Duration::hours(15));
    assert!(!tracker.can_call_today(SourceId::YahooFinance));

    // And: The next UTC day allows the call again
    clock.advance(Duration::hours(1));
    assert!(tracker.can_call_today(SourceId::YahooFinance));
    assert_eq!(
        tracker
            .state(SourceId::YahooFinance)
            .expect("state")
            .daily_call_count,
        0
    );
}

#[test]
fn when_one_source_is_exhausted_the_others_keep_their_budget() {
    // Given: A tracker where Yahoo Finance was already called
    let temp = tempdir().expect("tempdir");
    let tracker = open_tracker(&temp, morning());
    tracker
        .record_call(SourceId::YahooFinance)
        .expect("record call");

    // Then: Alpha Vantage is unaffected
    assert!(!tracker.can_call_today(SourceId::YahooFinance));
    assert!(tracker.can_call_today(SourceId::AlphaVantage));
}

#[test]
fn when_the_limit_is_raised_more_calls_are_allowed_the_same_day() {
    // Given: A tracker allowing three Alpha Vantage calls per day
    let temp = tempdir().expect("tempdir");
    let tracker = open_tracker(&temp, morning());
    tracker
        .set_max_daily_calls(SourceId::AlphaVantage, 3)
        .expect("set max");

    // When: Calls are recorded one by one
    for expected in 1..=3 {
        assert!(tracker.can_call_today(SourceId::AlphaVantage));
        let state = tracker
            .record_call(SourceId::AlphaVantage)
            .expect("record call");
        assert_eq!(state.daily_call_count, expected);
    }

    // Then: The fourth is refused
    assert!(!tracker.can_call_today(SourceId::AlphaVantage));
}

// =============================================================================
// Budget: Persistence
// =============================================================================

#[test]
fn when_the_process_restarts_the_budget_is_still_spent() {
    // Given: A call recorded by one tracker instance
    let temp = tempdir().expect("tempdir");
    let clock = morning();
    {
        let tracker = open_tracker(&temp, clock.clone());
        tracker
            .record_call(SourceId::AlphaVantage)
            .expect("record call");
        tracker
            .record_success(SourceId::AlphaVantage)
            .expect("record success");
    }

    // When: A new tracker opens the same directory later that day
    clock.advance(Duration::hours(2));
    let tracker = open_tracker(&temp, clock);

    // Then: The source stays exhausted and keeps its success stamp
    assert!(!tracker.can_call_today(SourceId::AlphaVantage));
    let state = tracker.state(SourceId::AlphaVantage).expect("state");
    assert_eq!(state.daily_call_count, 1);
    assert_eq!(
        state.last_successful_update,
        Some(UtcDateTime::parse("2026-03-02T08:15:00Z").expect("timestamp"))
    );
}

#[test]
fn when_the_configured_limit_changes_between_runs_the_new_limit_applies() {
    // Given: A run that spent the default single Yahoo Finance call
    let temp = tempdir().expect("tempdir");
    let clock = morning();
    {
        let tracker = open_tracker(&temp, clock.clone());
        tracker
            .record_call(SourceId::YahooFinance)
            .expect("record call");
        assert!(!tracker.can_call_today(SourceId::YahooFinance));
    }

    // When: The next run is configured with three calls per day
    clock.advance(Duration::hours(1));
    let tracker = open_tracker(&temp, clock)
        .with_configured_max_daily_calls(3)
        .expect("configure limit");

    // Then: The persisted row takes the new limit and keeps today's count
    let state = tracker.state(SourceId::YahooFinance).expect("state");
    assert_eq!(state.max_daily_calls, 3);
    assert_eq!(state.daily_call_count, 1);
    assert!(tracker.can_call_today(SourceId::YahooFinance));

    // And: Sources that were never called get the same limit
    let alpha = tracker.state(SourceId::AlphaVantage).expect("state");
    assert_eq!(alpha.max_daily_calls, 3);
}

#[test]
fn when_budget_changes_the_json_mirror_reflects_it() {
    // Given: A tracker that recorded one Yahoo Finance call
    let temp = tempdir().expect("tempdir");
    let tracker = open_tracker(&temp, morning());
    tracker
        .record_call(SourceId::YahooFinance)
        .expect("record call");

    // Then: cache_metadata.json carries the same count
    let path = WarehouseConfig::for_home(temp.path())
        .cache_dir()
        .join(METADATA_FILE_NAME);
    let metadata = CacheMetadata::read(&path).expect("metadata");
    let yahoo = metadata
        .sources
        .get(SourceId::YahooFinance.as_str())
        .expect("yahoo entry");
    assert_eq!(yahoo.daily_call_count, 1);
    assert_eq!(yahoo.max_daily_calls, 1);
}
