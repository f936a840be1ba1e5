use std::time::{Duration, Instant};

use crossbeam_channel::{self, Receiver};

/// Longest single wait. A later target is reached by re-arming after each fire.
const MAX_WAIT_MS: i64 = 24 * 60 * 60 * 1000;

/// Outcome of `Timer::refresh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refresh {
    /// The target is in the future and the timer now fires at it.
    Armed,
    /// The target has already passed. The timer is left disarmed.
    Due,
}

/// The dispatcher's single-shot timer.
///
/// The timer is a single absolute deadline. Re-arming replaces the deadline, so a fire that
/// belonged to an earlier deadline can never be observed after a refresh.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Creates a disarmed timer.
    pub(crate) fn new() -> Timer {
        Timer { deadline: None }
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Points the timer at `target`, given that the clock reads `now` (both in milliseconds).
    pub(crate) fn refresh(&mut self, target: i64, now: i64) -> Refresh {
        self.disarm();

        if target <= now {
            return Refresh::Due;
        }

        let delta = target.saturating_sub(now).min(MAX_WAIT_MS);
        self.deadline = Some(Instant::now() + Duration::from_millis(delta as u64));
        Refresh::Armed
    }

    /// Returns a channel that receives once the current deadline passes, or never if the timer
    /// is disarmed.
    pub(crate) fn fire_ch(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        }
    }
}
