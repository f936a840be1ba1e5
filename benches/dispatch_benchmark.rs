use criterion::{criterion_group, criterion_main, Criterion};
use dispatch_delay_queue::{Config, Delay, DelayQueue, ManualClock, PriorityQueue};

fn offer_and_receive_bench(c: &mut Criterion) {
    let config = Config {
        capacity: 1024,
        offer_buffer: 64,
        expired_buffer: 64,
    };
    let queue = DelayQueue::with_config(ManualClock::new(1000), config);
    let expired = queue.expired_ch();
    queue.start().unwrap();

    c.bench_function("offer and receive expired element", |b| {
        b.iter(|| {
            queue.offer(Delay::until(1u64, 0)).unwrap();
            expired.recv().unwrap()
        })
    });

    queue.stop();
}

fn priority_queue_bench(c: &mut Criterion) {
    c.bench_function("push and pop 1000 elements", |b| {
        b.iter(|| {
            let mut heap = PriorityQueue::with_capacity(|a: &i64, b: &i64| a < b, 1000);
            for i in 0..1000i64 {
                heap.push(i * 7919 % 1000);
            }
            while heap.pop().is_some() {}
        })
    });
}

criterion_group!(benches, offer_and_receive_bench, priority_queue_bench);
criterion_main!(benches);
