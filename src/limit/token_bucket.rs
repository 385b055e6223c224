//! Token bucket with a background refill thread.
//!
//! One owned thread adds `rate * tick_ms / 1000` tokens every `tick_ms`
//! milliseconds, clamped to the capacity. Consumers CAS-decrement the pool.
//! Refill precision is one tick; callers that need smoother credit can lower
//! the tick at the cost of more wakeups.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

#[derive(Debug)]
struct Pool {
    tokens_bits: AtomicU64,
    stopped: AtomicBool,
}

impl Pool {
    fn tokens(&self) -> f64 {
        f64::from_bits(self.tokens_bits.load(Ordering::Relaxed))
    }
}

/// Continuous-refill credit pool.
///
/// The refill thread lives as long as the bucket; [`stop`](TokenBucket::stop)
/// or `Drop` shuts it down. Consuming is lock-free.
#[derive(Debug)]
pub struct TokenBucket {
    pool: Arc<Pool>,
    cap: f64,
    refill: Mutex<Option<JoinHandle<()>>>,
}

impl TokenBucket {
    /// Creates a bucket refilled at `rate` tokens per second, discretized to
    /// one deposit every `tick_ms` milliseconds, holding at most `cap` tokens.
    ///
    /// The pool starts empty. Panics if `tick_ms` is zero or `cap`/`rate` are
    /// not finite non-negative numbers.
    pub fn new(tick_ms: u64, cap: f64, rate: f64) -> Self {
        assert!(tick_ms > 0, "refill tick must be positive");
        assert!(cap >= 0.0 && cap.is_finite(), "capacity must be finite and non-negative");
        assert!(rate >= 0.0 && rate.is_finite(), "refill rate must be finite and non-negative");

        let pool = Arc::new(Pool {
            tokens_bits: AtomicU64::new(0f64.to_bits()),
            stopped: AtomicBool::new(false),
        });
        let worker = Arc::clone(&pool);
        let per_tick = rate * tick_ms as f64 / 1000.0;
        let handle = thread::spawn(move || {
            while !worker.stopped.load(Ordering::Relaxed) {
                let mut cur = worker.tokens();
                while cur < cap {
                    let next = (cur + per_tick).min(cap);
                    match worker.tokens_bits.compare_exchange_weak(
                        cur.to_bits(),
                        next.to_bits(),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => break,
                        Err(bits) => cur = f64::from_bits(bits),
                    }
                }
                thread::sleep(Duration::from_millis(tick_ms));
            }
        });

        TokenBucket {
            pool,
            cap,
            refill: Mutex::new(Some(handle)),
        }
    }

    /// Returns the tokens currently available.
    #[inline]
    pub fn available(&self) -> f64 {
        self.pool.tokens()
    }

    /// Returns the maximum number of tokens the bucket holds.
    #[inline]
    pub fn capacity(&self) -> f64 {
        self.cap
    }

    /// Takes `amount` tokens from the pool.
    ///
    /// Returns `false` when `amount` is not positive or fewer than `amount`
    /// tokens are available. Never takes a partial amount.
    pub fn consume(&self, amount: f64) -> bool {
        if amount <= 0.0 {
            return false;
        }
        let mut cur = self.pool.tokens();
        while cur >= amount {
            match self.pool.tokens_bits.compare_exchange_weak(
                cur.to_bits(),
                (cur - amount).to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(bits) => cur = f64::from_bits(bits),
            }
        }
        false
    }

    /// Stops the refill thread and waits for it to exit.
    ///
    /// Returns `false` if the bucket was already stopped.
    pub fn stop(&self) -> bool {
        if self
            .pool
            .stopped
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        if let Some(handle) = self.refill.lock().take() {
            let _ = handle.join();
        }
        true
    }
}

impl Drop for TokenBucket {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
