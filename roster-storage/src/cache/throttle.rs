//! Compare-and-swap refresh debounce.
//!
//! A [`RefreshThrottle`] decides which caller gets to run an expensive
//! refresh. It is not a lock: callers that lose never wait, they carry on
//! with whatever the cache currently holds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use roster_core::{now_millis, CacheSettings, DurationMs};

/// Debounce state for throttled refreshes.
#[derive(Debug)]
pub struct RefreshThrottle {
    /// Epoch milliseconds at which the last admitted refresh began.
    last_refresh: AtomicI64,
    /// Minimum elapsed time before a conditional refresh is admitted.
    delay_ms: DurationMs,
}

impl RefreshThrottle {
    /// Create a throttle that has never admitted a refresh.
    pub fn new(delay_ms: DurationMs) -> Self {
        Self {
            last_refresh: AtomicI64::new(0),
            delay_ms: delay_ms.max(0),
        }
    }

    /// Create a throttle using the configured refresh delay.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.refresh_delay_ms())
    }

    /// The configured minimum interval.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms as u64)
    }

    /// Epoch milliseconds of the last admitted refresh, 0 if none.
    pub fn last_refresh_ms(&self) -> DurationMs {
        self.last_refresh.load(Ordering::Acquire)
    }

    /// Try to claim the next refresh.
    ///
    /// Admitted when `force` is set or more than the delay has elapsed
    /// since the last refresh, and this caller wins the swap of the
    /// timestamp from the value it observed to now. Concurrent callers that
    /// observed the same timestamp lose the swap and get `false`.
    pub fn try_acquire(&self, force: bool) -> bool {
        self.try_acquire_at(force, now_millis())
    }

    pub(crate) fn try_acquire_at(&self, force: bool, now: DurationMs) -> bool {
        let last = self.last_refresh.load(Ordering::Acquire);
        let due = force || now.saturating_sub(last) > self.delay_ms;
        if !due {
            return false;
        }
        // Never move the timestamp backwards if the wall clock does.
        let next = now.max(last);
        self.last_refresh
            .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
