//! Fixed-window request gate.
//!
//! Admits at most `limit` calls per `window_ms` milliseconds. State is two
//! independent atomics, `(window_start_ms, count)`, with no lock around the
//! pair. Rolling the window and counting inside it race benignly: a call can
//! be rejected that a strictly serialized gate would have admitted, but the
//! gate never admits more than `limit` calls whose window observation was the
//! same. Callers that need a strict quota should use
//! [`TokenBucket`](crate::limit::TokenBucket) instead.
//!
//! ## Admission flow
//!
//! ```text
//!   allow()
//!     │ now - window_start >= window_ms ?
//!     ├── yes: CAS window_start -> now
//!     │        ├── won:  count = 1, admit
//!     │        └── lost: retry from the top
//!     └── no:  count >= limit ?
//!              ├── yes: window unchanged ? reject : retry
//!              └── no:  CAS count -> count + 1
//!                       ├── won:  admit
//!                       └── lost: re-examine count
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Fixed-window rate limiter.
///
/// The window clock starts at construction; the first window begins
/// immediately. All methods take `&self` and are lock-free.
#[derive(Debug)]
pub struct WindowLimiter {
    origin: Instant,
    window_ms: u64,
    limit: u32,
    window_start_ms: AtomicU64,
    count: AtomicU32,
}

impl WindowLimiter {
    /// Creates a limiter admitting `limit` calls per `window_ms` milliseconds.
    ///
    /// Panics if either parameter is zero.
    pub fn new(window_ms: u64, limit: u32) -> Self {
        assert!(window_ms > 0, "window length must be positive");
        assert!(limit > 0, "window limit must be positive");
        WindowLimiter {
            origin: Instant::now(),
            window_ms,
            limit,
            window_start_ms: AtomicU64::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Returns the per-window admission limit.
    #[inline]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the window length in milliseconds.
    #[inline]
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Requests admission for one event.
    ///
    /// Returns `false` when the quota for the current window is exhausted.
    pub fn allow(&self) -> bool {
        loop {
            let now = self.now_ms();
            let window_start = self.window_start_ms.load(Ordering::Relaxed);
            // saturating: a concurrent roll can push window_start past `now`
            if now.saturating_sub(window_start) >= self.window_ms {
                if self
                    .window_start_ms
                    .compare_exchange_weak(window_start, now, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    self.count.store(1, Ordering::Relaxed);
                    return true;
                }
                continue;
            }

            let mut count = self.count.load(Ordering::Relaxed);
            if count >= self.limit {
                // only final once the window is confirmed unmoved
                if self.window_start_ms.load(Ordering::Relaxed) == window_start {
                    return false;
                }
                continue;
            }
            loop {
                if count >= self.limit {
                    break;
                }
                match self.count.compare_exchange_weak(
                    count,
                    count + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return true,
                    Err(actual) => count = actual,
                }
            }
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
