use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{
    self, select, Receiver, Select, SendError, Sender, TryRecvError, TrySendError,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::clock::{Clock, SystemClock};
use crate::delayed::Delayed;
use crate::error::{DelayQueueError, OfferError};
use crate::priority_queue::PriorityQueue;
use crate::timer::{Refresh, Timer};

/// Tuning knobs for a `DelayQueue`.
///
/// The defaults reproduce a depth-one handoff on both sides: one offer may wait for the
/// dispatcher and one delivered item may wait for a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of items to preallocate room for. Not a limit.
    pub capacity: usize,

    /// Offers that can be buffered before `offer` blocks and `try_offer` fails with `Full`.
    /// Zero makes every offer a rendezvous with the dispatcher.
    pub offer_buffer: usize,

    /// Expired items that can be buffered before the dispatcher blocks on delivery.
    ///
    /// While the dispatcher is blocked it handles no offers and no timer fires, so a consumer
    /// that stops draining `expired_ch` stalls the whole queue.
    pub expired_buffer: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            capacity: 0,
            offer_buffer: 1,
            expired_buffer: 1,
        }
    }
}

/// Lifecycle state of a `DelayQueue`, as seen from outside the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Created but not started yet.
    Created,
    /// The dispatcher is running.
    Running,
    /// The dispatcher exited after a stop, or because every handle was dropped.
    Stopped,
    /// The dispatcher panicked. Nothing will be delivered any more.
    Dead,
}

impl QueueState {
    fn from_u8(state: u8) -> QueueState {
        match state {
            0 => QueueState::Created,
            1 => QueueState::Running,
            2 => QueueState::Stopped,
            _ => QueueState::Dead,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            QueueState::Created => 0,
            QueueState::Running => 1,
            QueueState::Stopped => 2,
            QueueState::Dead => 3,
        }
    }
}

/// A concurrent delay queue that delivers each item on a channel once its expiration has
/// passed, in expiration order.
///
/// A dedicated dispatcher thread owns the pending items and the single timer. Producers hand
/// items to it with `offer`; consumers receive expired items from `expired_ch`. Cloning a
/// queue gives another handle to the same dispatcher.
///
/// Time is read from the `Clock` given at construction. The dispatcher sleeps for the
/// difference between an item's expiration and the clock's current reading, then checks the
/// clock again before delivering, so no item is ever delivered before the clock reaches its
/// expiration.
///
/// # Examples
///
/// Basic usage:
///
/// ```no_run
/// use dispatch_delay_queue::{Delay, DelayQueue, SystemClock};
/// use std::time::Duration;
///
/// let queue = DelayQueue::new(SystemClock);
/// queue.start().unwrap();
///
/// queue.offer(Delay::for_duration("2nd", Duration::from_secs(5))).unwrap();
/// queue.offer(Delay::for_duration("1st", Duration::from_secs(0))).unwrap();
///
/// let expired = queue.expired_ch();
/// println!("First: {}", expired.recv().unwrap().value);
/// println!("Second: {}", expired.recv().unwrap().value);
///
/// queue.stop();
/// ```
pub struct DelayQueue<T: Delayed> {
    /// Points to the data that is shared between instances of the same queue (created by
    /// cloning a queue).
    shared_data: Arc<DelayQueueSharedData<T>>,
}

/// The underlying data of a queue.
struct DelayQueueSharedData<T> {
    offer_tx: Sender<T>,
    stop_tx: Sender<()>,
    expired_rx: Receiver<T>,
    status: Arc<Status>,

    /// The dispatcher, until `start` moves it onto its own thread or `stop` drops it.
    dispatcher: Mutex<Option<Dispatcher<T>>>,
}

/// What the dispatcher publishes about itself.
#[derive(Debug)]
struct Status {
    len: AtomicUsize,
    state: AtomicU8,
    stop_requested: AtomicBool,
}

impl Status {
    fn state(&self) -> QueueState {
        QueueState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: QueueState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

impl<T> DelayQueue<T>
where
    T: Delayed + Send + 'static,
{
    /// Creates an empty `DelayQueue<T>` that reads time from `clock`.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::{Delay, DelayQueue, ManualClock};
    ///
    /// let queue: DelayQueue<Delay<i32>> = DelayQueue::new(ManualClock::new(0));
    /// ```
    pub fn new<C: Clock + 'static>(clock: C) -> DelayQueue<T> {
        DelayQueue::with_config(clock, Config::default())
    }

    /// Creates an empty `DelayQueue<T>` with room for `capacity` items before the pending
    /// items have to be reallocated.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::{Delay, DelayQueue, SystemClock};
    ///
    /// let queue: DelayQueue<Delay<&str>> = DelayQueue::with_capacity(SystemClock, 10);
    /// ```
    pub fn with_capacity<C: Clock + 'static>(clock: C, capacity: usize) -> DelayQueue<T> {
        DelayQueue::with_config(
            clock,
            Config {
                capacity,
                ..Config::default()
            },
        )
    }

    /// Creates an empty `DelayQueue<T>` from an explicit `Config`.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::{Config, Delay, DelayQueue, SystemClock};
    ///
    /// let config = Config { expired_buffer: 64, ..Config::default() };
    /// let queue: DelayQueue<Delay<u64>> = DelayQueue::with_config(SystemClock, config);
    /// ```
    pub fn with_config<C: Clock + 'static>(clock: C, config: Config) -> DelayQueue<T> {
        let (offer_tx, offer_rx) = crossbeam_channel::bounded(config.offer_buffer);
        let (expired_tx, expired_rx) = crossbeam_channel::bounded(config.expired_buffer);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let status = Arc::new(Status {
            len: AtomicUsize::new(0),
            state: AtomicU8::new(QueueState::Created.as_u8()),
            stop_requested: AtomicBool::new(false),
        });

        let dispatcher = Dispatcher {
            heap: PriorityQueue::with_capacity(
                expires_before::<T> as fn(&T, &T) -> bool,
                config.capacity,
            ),
            timer: Timer::new(),
            clock: Arc::new(clock),
            offer_rx,
            stop_rx,
            expired_tx,
            status: status.clone(),
        };

        DelayQueue {
            shared_data: Arc::new(DelayQueueSharedData {
                offer_tx,
                stop_tx,
                expired_rx,
                status,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    /// Submits an item for delivery once it expires.
    ///
    /// Blocks while the insertion buffer is full. Items that have already expired are
    /// delivered as soon as the dispatcher sees them.
    ///
    /// Returns the item in `OfferError::Stopped` if the dispatcher has exited. An offer that
    /// races with `stop` may be accepted and then never delivered.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// use dispatch_delay_queue::{Delay, DelayQueue, ManualClock};
    ///
    /// let queue = DelayQueue::new(ManualClock::new(0));
    /// queue.start().unwrap();
    /// queue.offer(Delay::until("abc", 0)).unwrap();
    ///
    /// assert_eq!(queue.expired_ch().recv().unwrap().value, "abc");
    /// ```
    pub fn offer(&self, item: T) -> Result<(), OfferError<T>> {
        self.shared_data
            .offer_tx
            .send(item)
            .map_err(|SendError(item)| OfferError::Stopped(item))
    }

    /// Submits an item for delivery once it expires, without blocking.
    ///
    /// Returns the item in `OfferError::Full` if the insertion buffer is full, or in
    /// `OfferError::Stopped` if the dispatcher has exited.
    pub fn try_offer(&self, item: T) -> Result<(), OfferError<T>> {
        self.shared_data
            .offer_tx
            .try_send(item)
            .map_err(|err| match err {
                TrySendError::Full(item) => OfferError::Full(item),
                TrySendError::Disconnected(item) => OfferError::Stopped(item),
            })
    }

    /// Returns the stream of expired items.
    ///
    /// Items arrive in non-decreasing expiration order. Iterating the receiver ends once the
    /// dispatcher has exited. The dispatcher blocks when the stream is full, so it has to be
    /// drained.
    pub fn expired_ch(&self) -> Receiver<T> {
        self.shared_data.expired_rx.clone()
    }

    /// Returns the number of items offered to the dispatcher and not yet handed to
    /// `expired_ch`.
    ///
    /// Offers still waiting in the insertion buffer are not counted, and neither is an
    /// expired item the dispatcher is blocked delivering.
    pub fn len(&self) -> usize {
        self.shared_data.status.len.load(Ordering::SeqCst)
    }

    /// Checks if the queue has no pending items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the lifecycle state of the queue.
    pub fn state(&self) -> QueueState {
        self.shared_data.status.state()
    }

    /// Checks that the dispatcher has not panicked.
    pub fn is_alive(&self) -> bool {
        self.state() != QueueState::Dead
    }

    /// Starts the dispatcher on its own thread.
    ///
    /// A queue can only be started once.
    pub fn start(&self) -> Result<(), DelayQueueError> {
        let mut slot = self.shared_data.dispatcher.lock();
        let dispatcher = match slot.take() {
            Some(dispatcher) => dispatcher,
            None if self.state() == QueueState::Running
                && !self.shared_data.status.stop_requested.load(Ordering::SeqCst) =>
            {
                return Err(DelayQueueError::AlreadyStarted)
            }
            None => return Err(DelayQueueError::Stopped),
        };

        let status = self.shared_data.status.clone();
        status.set_state(QueueState::Running);

        let spawned = thread::Builder::new()
            .name("delay-queue-dispatcher".to_string())
            .spawn(move || dispatcher.run());

        if let Err(err) = spawned {
            error!(error = %err, "failed to spawn delay queue dispatcher");
            status.set_state(QueueState::Dead);
            return Err(DelayQueueError::Spawn(err));
        }
        Ok(())
    }

    /// Asks the dispatcher to stop. Never blocks.
    ///
    /// There is no confirmation: the dispatcher stops at its next wakeup. Items already
    /// buffered in `expired_ch` can still be received; an item the dispatcher was blocked
    /// delivering stays pending. Stopping a queue that was never started ends `expired_ch`
    /// right away. Calling `stop` again has no effect.
    pub fn stop(&self) {
        self.shared_data
            .status
            .stop_requested
            .store(true, Ordering::SeqCst);

        if let Some(dispatcher) = self.shared_data.dispatcher.lock().take() {
            self.shared_data.status.set_state(QueueState::Stopped);
            drop(dispatcher);
            info!("delay queue stopped before start");
            return;
        }

        match self.shared_data.stop_tx.try_send(()) {
            Ok(()) => debug!("delay queue stop requested"),
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
    }
}

impl<T> Default for DelayQueue<T>
where
    T: Delayed + Send + 'static,
{
    /// Creates an empty `DelayQueue<T>` on the system clock.
    fn default() -> DelayQueue<T> {
        DelayQueue::new(SystemClock)
    }
}

impl<T: Delayed> Clone for DelayQueue<T> {
    /// Returns a new `DelayQueue` that points to the same dispatcher.
    ///
    /// The dispatcher exits once every handle is dropped.
    fn clone(&self) -> DelayQueue<T> {
        DelayQueue {
            shared_data: self.shared_data.clone(),
        }
    }
}

impl<T: Delayed> fmt::Debug for DelayQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = &self.shared_data.status;
        f.debug_struct("DelayQueue")
            .field("len", &status.len.load(Ordering::SeqCst))
            .field("state", &status.state())
            .finish()
    }
}

/// Heap order of the dispatcher: earliest expiration first.
fn expires_before<T: Delayed>(a: &T, b: &T) -> bool {
    a.expiration() < b.expiration()
}

/// Whether the event loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// One wakeup of the event loop.
enum Event<T> {
    Stop,
    Offer(T),
    Fire,
    Disconnected,
}

/// The single owner of the pending items and the timer.
///
/// Field order matters: `offer_rx` is dropped before `expired_tx`, so once consumers see
/// `expired_ch` disconnect, producers already get `OfferError::Stopped`.
struct Dispatcher<T> {
    heap: PriorityQueue<T, fn(&T, &T) -> bool>,
    timer: Timer,
    clock: Arc<dyn Clock>,
    status: Arc<Status>,
    stop_rx: Receiver<()>,
    offer_rx: Receiver<T>,
    expired_tx: Sender<T>,
}

impl<T: Delayed> Dispatcher<T> {
    /// Runs the event loop until stopped, then publishes how it ended.
    fn run(mut self) {
        info!("delay queue dispatcher started");

        match panic::catch_unwind(AssertUnwindSafe(|| self.event_loop())) {
            Ok(()) => {
                info!(pending = self.heap.len(), "delay queue dispatcher stopped");
                self.status.set_state(QueueState::Stopped);
            }
            Err(_) => {
                error!("delay queue dispatcher panicked, queue is dead");
                self.status.set_state(QueueState::Dead);
            }
        }
    }

    fn event_loop(&mut self) {
        loop {
            // A pending stop wins over a timer or offer that is ready at the same time.
            match self.stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => {}
            }

            let fire_ch = self.timer.fire_ch();
            let event = select! {
                recv(self.stop_rx) -> _ => Event::Stop,
                recv(self.offer_rx) -> offer => match offer {
                    Ok(item) => Event::Offer(item),
                    Err(_) => Event::Disconnected,
                },
                recv(fire_ch) -> _ => Event::Fire,
            };

            let flow = match event {
                Event::Stop => Flow::Exit,
                Event::Disconnected => {
                    debug!("every delay queue handle dropped");
                    Flow::Exit
                }
                Event::Offer(item) => self.handle_offer(item),
                Event::Fire => {
                    self.timer.disarm();
                    self.handle_timeout()
                }
            };

            if flow == Flow::Exit {
                return;
            }
        }
    }

    fn handle_offer(&mut self, item: T) -> Flow {
        let expiration = item.expiration();
        let earliest = self.heap.peek().map(|top| top.expiration());

        self.heap.push(item);
        self.publish_len();
        debug!(expiration, pending = self.heap.len(), "item offered");

        // The timer only ever moves earlier on an offer.
        match earliest {
            Some(earliest) if expiration >= earliest => Flow::Continue,
            _ => match self.timer.refresh(expiration, self.clock.now_ms()) {
                Refresh::Armed => {
                    debug!(expiration, "timer armed");
                    Flow::Continue
                }
                Refresh::Due => self.handle_timeout(),
            },
        }
    }

    /// Delivers every expired item, then arms the timer for the earliest one left.
    fn handle_timeout(&mut self) -> Flow {
        while let Some(expiration) = self.heap.peek().map(|top| top.expiration()) {
            if self.timer.refresh(expiration, self.clock.now_ms()) == Refresh::Armed {
                debug!(expiration, "timer armed");
                return Flow::Continue;
            }

            let item = match self.heap.pop() {
                Some(item) => item,
                None => break,
            };
            self.publish_len();
            if self.deliver(item) == Flow::Exit {
                return Flow::Exit;
            }
        }

        debug_assert!(!self.timer.is_armed());
        Flow::Continue
    }

    /// Hands an expired item to the consumers, blocking until there is room or a stop
    /// arrives. An undelivered item goes back on the heap.
    fn deliver(&mut self, item: T) -> Flow {
        let expiration = item.expiration();

        let mut sel = Select::new();
        let send_index = sel.send(&self.expired_tx);
        sel.recv(&self.stop_rx);
        let oper = sel.select();

        if oper.index() == send_index {
            match oper.send(&self.expired_tx, item) {
                Ok(()) => {
                    trace!(expiration, "item delivered");
                    Flow::Continue
                }
                Err(SendError(item)) => {
                    debug!(expiration, "no consumer left for expired item");
                    self.heap.push(item);
                    self.publish_len();
                    Flow::Exit
                }
            }
        } else {
            let _ = oper.recv(&self.stop_rx);
            debug!(expiration, "stop requested while delivering");
            self.heap.push(item);
            self.publish_len();
            Flow::Exit
        }
    }

    fn publish_len(&self) {
        self.status.len.store(self.heap.len(), Ordering::SeqCst);
    }
}
