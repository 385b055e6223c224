//! Error types for the synckit library.
//!
//! ## Key Components
//!
//! - [`Full`]: Returned by bounded queues when every slot is occupied. Carries
//!   the rejected element so the caller can retry or drop it deliberately.
//!
//! Everything else in the library reports conditional failure through plain
//! `bool` or `Option` returns; there is no error channel for invariant
//! violations, which panic at construction instead.

use std::fmt;

// ---------------------------------------------------------------------------
// Full
// ---------------------------------------------------------------------------

/// Error returned when a bounded queue has no free slot.
///
/// The element that could not be enqueued is handed back so that nothing is
/// lost on a full queue.
///
/// # Example
///
/// ```
/// use synckit::queue::RingBuffer;
///
/// let ring: RingBuffer<u32, 2> = RingBuffer::new();
/// ring.try_push(1).unwrap();
/// ring.try_push(2).unwrap();
/// let err = ring.try_push(3).unwrap_err();
/// assert_eq!(err.into_inner(), 3);
/// ```
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the element that was rejected.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> std::error::Error for Full<T> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_display_is_stable() {
        let err = Full(7u32);
        assert_eq!(err.to_string(), "queue is full");
    }

    #[test]
    fn full_debug_hides_payload() {
        struct Opaque;
        let err = Full(Opaque);
        assert_eq!(format!("{:?}", err), "Full(..)");
    }

    #[test]
    fn full_returns_rejected_element() {
        let err = Full(String::from("payload"));
        assert_eq!(err.into_inner(), "payload");
    }

    #[test]
    fn full_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<Full<u64>>();
    }
}
