//! Injectable time source.
//!
//! Budget rollover and cache freshness both depend on "now"; routing every read
//! through [`Clock`] lets tests move time explicitly with [`ManualClock`].

use std::sync::{Mutex, PoisonError};

use time::{Date, Duration, OffsetDateTime};

use crate::domain::UtcDateTime;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> UtcDateTime;

    /// Calendar day used for budgets and cache keys.
    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcDateTime {
        UtcDateTime::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<UtcDateTime>,
}

impl ManualClock {
    pub fn new(start: UtcDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, value: UtcDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.add(by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(UtcDateTime::from_unix_timestamp(0).unwrap_or_else(|_| UtcDateTime::now()))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UtcDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<OffsetDateTime> for ManualClock {
    fn from(value: OffsetDateTime) -> Self {
        Self::new(UtcDateTime::from_utc(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_advances_across_midnight() {
        let clock = ManualClock::from(datetime!(2026-03-02 23:30 UTC));
        assert_eq!(clock.today().to_string(), "2026-03-02");

        clock.advance(Duration::minutes(45));
        assert_eq!(clock.today().to_string(), "2026-03-03");
        assert_eq!(clock.now().format_rfc3339(), "2026-03-03T00:15:00Z");
    }
}
