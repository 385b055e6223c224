//! Atomic cell that tracks a running minimum or maximum.

use std::fmt;

use crate::atomic::scalar::AtomicScalar;

/// Shared numeric cell updated only by improving proposals.
///
/// `update_min` replaces the value when the proposal is strictly smaller,
/// `update_max` when it is strictly larger. For floating point cells a NaN
/// proposal is rejected outright, while a NaN current value is replaced
/// unconditionally so that one poisoned sample cannot wedge the cell. The
/// NaN checks compile away for integer cells.
pub struct MinMax<T: AtomicScalar> {
    cell: T::Atomic,
}

impl<T: AtomicScalar> MinMax<T> {
    /// Creates a cell holding `init`.
    pub fn new(init: T) -> Self {
        MinMax {
            cell: T::atomic_new(init),
        }
    }

    /// Returns the current value.
    #[inline]
    pub fn load(&self) -> T {
        T::atomic_load(&self.cell)
    }

    /// Lowers the cell to `proposal` if it improves on the current minimum.
    ///
    /// Returns `true` when the cell changed.
    pub fn update_min(&self, proposal: T) -> bool {
        if proposal.is_nan() {
            return false;
        }
        let mut cur = T::atomic_load(&self.cell);
        loop {
            if cur.is_nan() {
                match T::atomic_compare_exchange_weak(&self.cell, cur, proposal) {
                    Ok(_) => return true,
                    Err(actual) => {
                        cur = actual;
                        continue;
                    }
                }
            }
            if cur <= proposal {
                return false;
            }
            match T::atomic_compare_exchange_weak(&self.cell, cur, proposal) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Raises the cell to `proposal` if it improves on the current maximum.
    ///
    /// Returns `true` when the cell changed.
    pub fn update_max(&self, proposal: T) -> bool {
        if proposal.is_nan() {
            return false;
        }
        let mut cur = T::atomic_load(&self.cell);
        loop {
            if cur.is_nan() {
                match T::atomic_compare_exchange_weak(&self.cell, cur, proposal) {
                    Ok(_) => return true,
                    Err(actual) => {
                        cur = actual;
                        continue;
                    }
                }
            }
            if cur >= proposal {
                return false;
            }
            match T::atomic_compare_exchange_weak(&self.cell, cur, proposal) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }
}

impl<T: AtomicScalar + fmt::Debug> fmt::Debug for MinMax<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinMax")
            .field("value", &self.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_and_max_track_improvements() {
        let cell = MinMax::new(10.0f64);
        assert_eq!(cell.load(), 10.0);
        assert!(cell.update_min(5.0));
        assert_eq!(cell.load(), 5.0);
        assert!(!cell.update_min(6.0));
        assert!(cell.update_max(12.0));
        assert_eq!(cell.load(), 12.0);
        assert!(!cell.update_max(11.0));
    }

    #[test]
    fn nan_proposal_is_rejected() {
        let cell = MinMax::new(10.0f64);
        assert!(!cell.update_min(f64::NAN));
        assert!(!cell.update_max(f64::NAN));
        assert_eq!(cell.load(), 10.0);
    }

    #[test]
    fn nan_current_is_replaced() {
        let cell = MinMax::new(f64::NAN);
        assert!(cell.update_min(7.0));
        assert_eq!(cell.load(), 7.0);

        let cell = MinMax::new(f64::NAN);
        assert!(cell.update_max(-7.0));
        assert_eq!(cell.load(), -7.0);
    }

    #[test]
    fn integer_cells_work_without_nan_paths() {
        let cell = MinMax::new(100u64);
        assert!(cell.update_min(10));
        assert!(!cell.update_min(10));
        assert!(cell.update_max(11));
        assert_eq!(cell.load(), 11);
    }

    #[test]
    fn concurrent_updates_settle_on_extremes() {
        use std::sync::Arc;
        use std::thread;

        let cell = Arc::new(MinMax::new(0i64));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for i in 0..1_000i64 {
                        let _ = cell.update_max(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.load(), 3_999);
    }
}
