//! A concurrent delay queue where each item is delivered on a channel once its expiration
//! time has passed, in expiration order.
//!
//! A single dispatcher thread owns the pending items and the timer. Producers hand items
//! over through [`DelayQueue::offer`] and consumers drain [`DelayQueue::expired_ch`].
//! Time comes from an injected [`Clock`], so the queue can be driven by simulated time in
//! tests.

#![warn(missing_docs)]

mod clock;
mod delay_queue;
mod delayed;
mod error;
mod priority_queue;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delay_queue::{Config, DelayQueue, QueueState};
pub use delayed::{Delay, Delayed};
pub use error::{DelayQueueError, OfferError};
pub use priority_queue::PriorityQueue;
