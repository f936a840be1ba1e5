use std::io;

use thiserror::Error;

/// Errors from the lifecycle of a `DelayQueue`.
#[derive(Debug, Error)]
pub enum DelayQueueError {
    /// `start` was called on a queue whose dispatcher is already running.
    #[error("delay queue already started")]
    AlreadyStarted,

    /// The queue has been stopped, or its dispatcher has died.
    #[error("delay queue is stopped")]
    Stopped,

    /// The dispatcher thread could not be spawned.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[from] io::Error),
}

/// An item could not be offered. The item is handed back.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum OfferError<T> {
    /// The insertion buffer is full and the dispatcher has not caught up yet.
    #[error("delay queue insertion buffer is full")]
    Full(T),

    /// The dispatcher has exited and will never accept the item.
    #[error("delay queue is stopped")]
    Stopped(T),
}

impl<T> OfferError<T> {
    /// Returns the item that could not be offered.
    pub fn into_inner(self) -> T {
        match self {
            OfferError::Full(item) | OfferError::Stopped(item) => item,
        }
    }
}
