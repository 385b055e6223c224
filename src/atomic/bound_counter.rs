//! Atomic counter confined to `[0, capacity]`.

use std::fmt;

use crate::atomic::scalar::AtomicScalar;

/// Shared counter that can never leave `[0, capacity]`.
///
/// `try_add` and `try_sub` apply their delta only when the result stays in
/// bounds; an out-of-bounds request is rejected as a whole rather than
/// saturating. Useful as a permit pool or an in-flight request cap.
pub struct BoundCounter<T: AtomicScalar> {
    cap: T,
    current: T::Atomic,
}

impl<T: AtomicScalar> BoundCounter<T> {
    /// Creates a counter at zero with the given capacity.
    ///
    /// Panics if `cap` is negative or NaN.
    pub fn new(cap: T) -> Self {
        assert!(
            !cap.is_negative() && !cap.is_nan(),
            "bound counter capacity must be non-negative"
        );
        BoundCounter {
            cap,
            current: T::atomic_new(T::ZERO),
        }
    }

    /// Returns the current value.
    #[inline]
    pub fn load(&self) -> T {
        T::atomic_load(&self.current)
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> T {
        self.cap
    }

    /// Adds `val`, failing if the result would exceed the capacity.
    ///
    /// Negative and NaN deltas are rejected.
    pub fn try_add(&self, val: T) -> bool {
        if val.is_negative() || val.is_nan() || val > self.cap {
            return false;
        }
        let mut cur = T::atomic_load(&self.current);
        loop {
            // overflow-safe form of `cur + val > cap`
            if cur > self.cap - val {
                return false;
            }
            match T::atomic_compare_exchange_weak(&self.current, cur, cur + val) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Subtracts `val`, failing if the result would drop below zero.
    ///
    /// Negative and NaN deltas are rejected.
    pub fn try_sub(&self, val: T) -> bool {
        if val.is_negative() || val.is_nan() {
            return false;
        }
        let mut cur = T::atomic_load(&self.current);
        loop {
            if cur < val {
                return false;
            }
            match T::atomic_compare_exchange_weak(&self.current, cur, cur - val) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl<T: AtomicScalar + fmt::Debug> fmt::Debug for BoundCounter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCounter")
            .field("current", &self.load())
            .field("capacity", &self.cap)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_respect_bounds() {
        let counter = BoundCounter::new(5i32);
        assert_eq!(counter.load(), 0);
        assert!(counter.try_add(3));
        assert_eq!(counter.load(), 3);
        assert!(!counter.try_add(3));
        assert_eq!(counter.load(), 3);
        assert!(counter.try_sub(2));
        assert_eq!(counter.load(), 1);
        assert!(!counter.try_sub(5));
        assert_eq!(counter.load(), 1);
    }

    #[test]
    fn negative_deltas_are_rejected() {
        let counter = BoundCounter::new(10i64);
        assert!(!counter.try_add(-1));
        assert!(!counter.try_sub(-1));
        assert_eq!(counter.load(), 0);
    }

    #[test]
    fn delta_larger_than_capacity_is_rejected() {
        let counter = BoundCounter::new(4u32);
        assert!(!counter.try_add(5));
        assert!(counter.try_add(4));
        assert_eq!(counter.load(), 4);
    }

    #[test]
    fn unsigned_counter_cannot_underflow() {
        let counter = BoundCounter::new(3u64);
        assert!(!counter.try_sub(1));
        assert!(counter.try_add(2));
        assert!(counter.try_sub(2));
        assert!(!counter.try_sub(1));
    }

    #[test]
    fn float_counter_rejects_nan() {
        let counter = BoundCounter::new(1.0f64);
        assert!(!counter.try_add(f64::NAN));
        assert!(counter.try_add(0.5));
        assert!(!counter.try_sub(f64::NAN));
        assert_eq!(counter.load(), 0.5);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-negative")]
    fn negative_capacity_panics() {
        let _ = BoundCounter::new(-1i32);
    }

    #[test]
    fn concurrent_adds_stop_at_capacity() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::thread;

        let counter = Arc::new(BoundCounter::new(500i64));
        let admitted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        if counter.try_add(1) {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::Relaxed), 500);
        assert_eq!(counter.load(), 500);
    }
}
