use std::time::Duration;

use crate::clock::{saturating_millis, Clock, SystemClock};

/// A value that expires at some point in time, expressed in milliseconds since the Unix epoch.
///
/// The `DelayQueue` only accepts values that implement this trait.
/// In most situations you do not need to implement this trait yourself. You can use the helper
/// struct `Delay`.
///
/// The `DelayQueue` assumes that the expiration of an item does not change while that item is
/// in the queue.
pub trait Delayed {
    /// Returns the expiration of this value, in milliseconds since the Unix epoch.
    fn expiration(&self) -> i64;

    /// Proposes a new expiration for this value. Returns `true` if it was accepted.
    ///
    /// The queue never calls this. It exists for callers that reschedule an item they got
    /// back from the queue and then offer it again. The default implementation rejects
    /// every proposal.
    fn set_expiration(&mut self, _expiration: i64) -> bool {
        false
    }
}

/// Wraps a value that should be delayed.
///
/// Implements `Delayed` and `Eq`. Two `Delay` objects are equal iff their wrapped `value`s are
/// equal and they expire at the same millisecond.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// use dispatch_delay_queue::{Delay, Delayed};
/// use std::time::Duration;
///
/// let delayed_one_hour = Delay::for_duration(123, Duration::from_secs(3600));
/// let delayed_at_epoch = Delay::until("abc", 0);
///
/// assert!(delayed_one_hour.expiration() > delayed_at_epoch.expiration());
/// assert_eq!(delayed_one_hour.value, 123);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delay<T> {
    /// The value that is delayed.
    pub value: T,

    /// Milliseconds since the Unix epoch at which `value` expires.
    expiration: i64,
}

impl<T> Delay<T> {
    /// Creates a new `Delay` holding `value` that expires at `expiration` milliseconds since
    /// the Unix epoch.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::Delay;
    ///
    /// let delayed = Delay::until("abc", 1_000);
    /// ```
    pub fn until(value: T, expiration: i64) -> Delay<T> {
        Delay { value, expiration }
    }

    /// Creates a new `Delay` holding `value` that expires once `duration` has elapsed on the
    /// system clock. Durations too long to represent expire at `i64::MAX`.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::Delay;
    /// use std::time::Duration;
    ///
    /// let delayed_one_hour = Delay::for_duration("abc", Duration::from_secs(3600));
    /// ```
    pub fn for_duration(value: T, duration: Duration) -> Delay<T> {
        let millis = saturating_millis(duration);
        Delay::until(value, SystemClock.now_ms().saturating_add(millis))
    }
}

impl<T> Delayed for Delay<T> {
    fn expiration(&self) -> i64 {
        self.expiration
    }

    /// Accepts any expiration at or after the Unix epoch.
    fn set_expiration(&mut self, expiration: i64) -> bool {
        if expiration < 0 {
            return false;
        }
        self.expiration = expiration;
        true
    }
}

impl<T: Default> Default for Delay<T> {
    fn default() -> Delay<T> {
        Delay {
            value: Default::default(),
            expiration: SystemClock.now_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Delay, Delayed};
    use std::time::Duration;

    struct Fixed(i64);

    impl Delayed for Fixed {
        fn expiration(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn compare_expiration() {
        let delayed_one_hour = Delay::for_duration(123, Duration::from_secs(3600));
        let delayed_now = Delay::for_duration("abc", Duration::from_secs(0));

        assert!(delayed_one_hour.expiration() > delayed_now.expiration());
    }

    #[test]
    fn huge_duration_saturates() {
        let never = Delay::for_duration("never", Duration::from_secs(u64::MAX));

        assert_eq!(never.expiration(), i64::MAX);
    }

    #[test]
    fn correct_value() {
        let delayed = Delay::until(123, 5);

        assert_eq!(delayed.value, 123);
        assert_eq!(delayed.expiration(), 5);
    }

    #[test]
    fn set_expiration_rejects_negative() {
        let mut delayed = Delay::until("abc", 10);

        assert!(delayed.set_expiration(20));
        assert_eq!(delayed.expiration(), 20);

        assert!(!delayed.set_expiration(-1));
        assert_eq!(delayed.expiration(), 20);
    }

    #[test]
    fn default_set_expiration_rejects() {
        let mut fixed = Fixed(7);

        assert!(!fixed.set_expiration(100));
        assert_eq!(fixed.expiration(), 7);
    }
}
