use std::convert::TryFrom;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current time, in milliseconds since the Unix epoch.
///
/// The `DelayQueue` reads time only through this trait, so it can be driven by a simulated
/// clock. Any `Fn() -> i64` closure that is `Send + Sync` is a `Clock`.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

impl<F> Clock for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now_ms(&self) -> i64 {
        self()
    }
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => saturating_millis(elapsed),
            // The system clock is set before 1970.
            Err(before) => -saturating_millis(before.duration()),
        }
    }
}

/// Whole milliseconds in `duration`, or `i64::MAX` if they do not fit.
pub(crate) fn saturating_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another to the queue.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// use dispatch_delay_queue::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1000);
/// let queue_clock = clock.clone();
///
/// clock.advance(50);
/// assert_eq!(queue_clock.now_ms(), 1050);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock that reads `now` milliseconds.
    pub fn new(now: i64) -> ManualClock {
        ManualClock {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves the clock forward by `millis` and returns the new time.
    pub fn advance(&self, millis: i64) -> i64 {
        self.now.fetch_add(millis, Ordering::SeqCst) + millis
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{saturating_millis, Clock, ManualClock, SystemClock};
    use std::time::Duration;

    #[test]
    fn closure_is_a_clock() {
        let clock = || 42i64;

        assert_eq!(clock.now_ms(), 42);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn millis_saturate_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::from_secs(u64::MAX)), i64::MAX);
    }

    #[test]
    fn manual_clock_shared_between_clones() {
        let clock = ManualClock::new(1000);
        let other = clock.clone();

        assert_eq!(other.advance(100), 1100);
        assert_eq!(clock.now_ms(), 1100);

        clock.set(5);
        assert_eq!(other.now_ms(), 5);
    }
}
