use std::thread;
use std::time::Duration;

use dispatch_delay_queue::{Delay, DelayQueue, SystemClock};

fn main() {
    let queue: DelayQueue<Delay<&str>> = DelayQueue::new(SystemClock);
    queue.start().unwrap();

    // The consumer blocks until each item has expired
    let expired = queue.expired_ch();
    let consumer_handle = thread::spawn(move || {
        for item in expired.iter().take(2) {
            println!("Expired: {}", item.value); // Prints "now", then "3s"
        }
    });

    // Clone the queue and move it to the producer thread
    let producer_queue = queue.clone();
    let producer_handle = thread::spawn(move || {
        // This item expires after 3 seconds
        producer_queue
            .offer(Delay::for_duration("3s", Duration::from_secs(3)))
            .unwrap();

        // This item expires immediately
        producer_queue
            .offer(Delay::for_duration("now", Duration::from_secs(0)))
            .unwrap();
    });

    producer_handle.join().unwrap();
    consumer_handle.join().unwrap();

    queue.stop();
    assert!(queue.is_empty());
}
