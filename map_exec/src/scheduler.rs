//! # Scheduling
//!
//! Fixed cadence update ticks and throttled reads. Both take the current time as an argument so
//! the main loop owns the clock.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Decides when the next pipeline update is due.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    period: Duration,
    last_tick: Option<Instant>,
}

/// Caches the result of an expensive read, refreshing it at most once per interval.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_refresh: Option<Instant>,
    cached: Option<T>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PollScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_tick: None,
        }
    }

    /// Returns true if a tick is due at `now`, and if so schedules the next one.
    ///
    /// The first call is always due. Missed ticks are not made up for, the next tick is always
    /// one period after the last one that ran.
    pub fn tick_due(&mut self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last_tick = Some(now);
                true
            }
        }
    }

    /// Time left until the next tick, zero if one is due.
    pub fn time_to_next_tick(&self, now: Instant) -> Duration {
        match self.last_tick {
            Some(last) => self.period.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::from_secs(0),
        }
    }
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_refresh: None,
            cached: None,
        }
    }

    /// Return the cached value, refreshing it with `refresh` if the interval since the last
    /// refresh has passed or nothing has been cached yet.
    pub fn get<F>(&mut self, now: Instant, refresh: F) -> &T
    where
        F: FnOnce() -> T,
    {
        let stale = match self.last_refresh {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };

        if stale {
            self.last_refresh = Some(now);
            self.cached = None;
        }

        self.cached.get_or_insert_with(refresh)
    }

    /// Forget the cached value so the next read refreshes it.
    pub fn invalidate(&mut self) {
        self.last_refresh = None;
        self.cached = None;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
