//! Throughput shootout between the lock-free ring and a mutexed baseline.
//!
//! Usage: `queue_bench [producers] [consumers] [seconds]`, defaults `4 4 2`.
//! Prints one line per queue:
//!
//! ```text
//! RingBuffer: produced=... consumed=... seconds=... ops/s=...
//! ```

use std::collections::VecDeque;
use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use synckit::error::Full;
use synckit::queue::RingBuffer;
use synckit::traits::ConcurrentQueue;

const RING_CAP: usize = 1 << 16;

/// Coarse-locked unbounded queue, the baseline the ring is measured against.
struct MutexQueue {
    inner: Mutex<VecDeque<i64>>,
}

impl MutexQueue {
    fn new() -> Self {
        MutexQueue {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl ConcurrentQueue<i64> for MutexQueue {
    fn try_enqueue(&self, value: i64) -> Result<(), Full<i64>> {
        self.inner.lock().push_back(value);
        Ok(())
    }

    fn try_dequeue(&self) -> Option<i64> {
        self.inner.lock().pop_front()
    }
}

struct BenchResult {
    name: &'static str,
    produced: i64,
    consumed: i64,
    seconds: f64,
}

fn run_bench<Q: ConcurrentQueue<i64>>(
    name: &'static str,
    queue: &Q,
    producers: u64,
    consumers: u64,
    seconds: u64,
) -> BenchResult {
    let start = AtomicBool::new(false);
    let stop = AtomicBool::new(false);
    let produced = AtomicI64::new(0);
    let consumed = AtomicI64::new(0);

    let begun = thread::scope(|scope| {
        for _ in 0..producers {
            scope.spawn(|| {
                while !start.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                let mut value = 0i64;
                while !stop.load(Ordering::Relaxed) {
                    if queue.try_enqueue(value).is_ok() {
                        value += 1;
                        produced.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
            });
        }
        for _ in 0..consumers {
            scope.spawn(|| {
                while !start.load(Ordering::Acquire) {
                    thread::yield_now();
                }
                while !stop.load(Ordering::Relaxed)
                    || consumed.load(Ordering::Relaxed) < produced.load(Ordering::Relaxed)
                {
                    if queue.try_dequeue().is_some() {
                        consumed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        thread::yield_now();
                    }
                }
            });
        }

        let begun = Instant::now();
        start.store(true, Ordering::Release);
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, Ordering::Relaxed);
        begun
    });

    // scope returns after every worker has joined, so the elapsed time
    // covers the drain phase as well
    BenchResult {
        name,
        produced: produced.load(Ordering::Relaxed),
        consumed: consumed.load(Ordering::Relaxed),
        seconds: begun.elapsed().as_secs_f64(),
    }
}

fn print_result(result: &BenchResult) {
    let ops = result.consumed as f64 / result.seconds;
    println!(
        "{}: produced={} consumed={} seconds={} ops/s={}",
        result.name, result.produced, result.consumed, result.seconds, ops
    );
}

fn parse_arg(args: &[String], index: usize, default: u64) -> u64 {
    match args.get(index) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                eprintln!("invalid argument {raw:?}: expected a positive integer");
                process::exit(2);
            }
        },
        None => default,
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let producers = parse_arg(&args, 1, 4);
    let consumers = parse_arg(&args, 2, 4);
    let seconds = parse_arg(&args, 3, 2);

    let ring: RingBuffer<i64, RING_CAP> = RingBuffer::new();
    let ring_result = run_bench("RingBuffer", &ring, producers, consumers, seconds);

    let mutexed = MutexQueue::new();
    let mutex_result = run_bench("MutexQueue", &mutexed, producers, consumers, seconds);

    print_result(&ring_result);
    print_result(&mutex_result);
}
