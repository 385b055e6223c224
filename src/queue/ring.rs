//! Bounded MPMC queue over sequence-numbered slots.
//!
//! Each slot carries a sequence counter that encodes both its occupancy and
//! the pass of the ring it belongs to:
//!
//! ```text
//!   slot i starts with            seq = i
//!   producer at position p needs  seq == p          (empty, this pass)
//!   consumer at position c needs  seq == c + 1      (full, this pass)
//!   after a pop the slot gets     seq = c + CAP     (empty, next pass)
//! ```
//!
//! A producer claims a position with one CAS on `tail`, writes the element,
//! and publishes it with a release store to the slot's sequence; the matching
//! acquire load on the consumer side carries the element across threads. The
//! cursors themselves need no ordering. `head` and `tail` sit on their own
//! cache lines so producers and consumers do not false-share.
//!
//! Cursor arithmetic wraps; occupancy checks use the signed difference
//! between the slot sequence and the cursor, so the ring keeps working after
//! `usize` overflow.
//!
//! Both operations are lock-free and never block: `try_push` fails on a full
//! ring handing the element back, `try_pop` fails on an empty one.

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::error::Full;
use crate::traits::ConcurrentQueue;

struct Slot<T> {
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Bounded multi-producer multi-consumer queue.
///
/// `CAP` must be a nonzero power of two; construction panics otherwise.
///
/// # Example
///
/// ```
/// use synckit::queue::RingBuffer;
///
/// let ring: RingBuffer<u32, 8> = RingBuffer::new();
/// ring.try_push(1).unwrap();
/// ring.try_push(2).unwrap();
/// assert_eq!(ring.try_pop(), Some(1));
/// assert_eq!(ring.try_pop(), Some(2));
/// assert_eq!(ring.try_pop(), None);
/// ```
pub struct RingBuffer<T, const CAP: usize> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    slots: Box<[Slot<T>]>,
}

// SAFETY: elements are moved in and out through raw slot cells, but a slot's
// sequence counter hands each element to exactly one consumer, with the
// release store on `seq` publishing the write.
unsafe impl<T: Send, const CAP: usize> Send for RingBuffer<T, CAP> {}
unsafe impl<T: Send, const CAP: usize> Sync for RingBuffer<T, CAP> {}

impl<T, const CAP: usize> RingBuffer<T, CAP> {
    /// Creates an empty ring.
    pub fn new() -> Self {
        assert!(
            CAP.is_power_of_two(),
            "ring capacity must be a nonzero power of two"
        );
        let slots = (0..CAP)
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        RingBuffer {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
        }
    }

    /// Attempts to enqueue `value`.
    ///
    /// Fails with [`Full`] (handing the element back) when the ring has no
    /// free slot. Never blocks; lost CAS races retry internally.
    pub fn try_push(&self, value: T) -> Result<(), Full<T>> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & (CAP - 1)];
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as isize;
            if diff == 0 {
                match self.tail.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: the tail CAS made this thread the sole
                        // owner of the slot until the release store below.
                        unsafe { (*slot.value.get()).write(value) };
                        slot.seq.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return Err(Full(value));
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Attempts to dequeue one element. Returns `None` when the ring is
    /// observed empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & (CAP - 1)];
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos.wrapping_add(1)) as isize;
            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: seq == pos + 1 showed the slot full for this
                        // pass and the head CAS claimed it for this thread;
                        // the acquire load of seq ordered the producer's write
                        // before this read.
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.seq.store(pos.wrapping_add(CAP), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Returns the number of stored elements.
    ///
    /// Approximate while producers or consumers are active.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        let diff = tail.wrapping_sub(head) as isize;
        if diff <= 0 { 0 } else { (diff as usize).min(CAP) }
    }

    /// Returns `true` when no elements are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        CAP
    }
}

impl<T, const CAP: usize> Default for RingBuffer<T, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAP: usize> fmt::Debug for RingBuffer<T, CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("capacity", &CAP)
            .finish()
    }
}

impl<T, const CAP: usize> Drop for RingBuffer<T, CAP> {
    fn drop(&mut self) {
        // quiescent by &mut: every position in [head, tail) holds a
        // fully published element
        let tail = self.tail.load(Ordering::Relaxed);
        let mut pos = self.head.load(Ordering::Relaxed);
        while pos != tail {
            let slot = &self.slots[pos & (CAP - 1)];
            unsafe { (*slot.value.get()).assume_init_drop() };
            pos = pos.wrapping_add(1);
        }
    }
}

impl<T: Send, const CAP: usize> ConcurrentQueue<T> for RingBuffer<T, CAP> {
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        self.try_push(value)
    }

    fn try_dequeue(&self) -> Option<T> {
        self.try_pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn pops_in_push_order() {
        let ring: RingBuffer<i32, 8> = RingBuffer::new();
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert_eq!(ring.try_pop(), Some(1));
        assert_eq!(ring.try_pop(), Some(2));
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn empty_ring_pops_nothing() {
        let ring: RingBuffer<u64, 4> = RingBuffer::new();
        assert_eq!(ring.try_pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_hands_the_element_back() {
        let ring: RingBuffer<usize, 4> = RingBuffer::new();
        for i in 0..4 {
            ring.try_push(i).unwrap();
        }
        let err = ring.try_push(99).unwrap_err();
        assert_eq!(err.into_inner(), 99);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn len_tracks_pushes_and_pops() {
        let ring: RingBuffer<u8, 8> = RingBuffer::new();
        assert_eq!(ring.len(), 0);
        ring.try_push(1).unwrap();
        ring.try_push(2).unwrap();
        assert_eq!(ring.len(), 2);
        ring.try_pop().unwrap();
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.capacity(), 8);
    }

    #[test]
    fn slots_are_reused_across_passes() {
        let ring: RingBuffer<usize, 4> = RingBuffer::new();
        for i in 0..40 {
            ring.try_push(i).unwrap();
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn interleaved_fill_and_drain() {
        let ring: RingBuffer<usize, 8> = RingBuffer::new();
        for round in 0..5 {
            for i in 0..8 {
                ring.try_push(round * 8 + i).unwrap();
            }
            assert!(ring.try_push(0).is_err());
            for i in 0..8 {
                assert_eq!(ring.try_pop(), Some(round * 8 + i));
            }
            assert_eq!(ring.try_pop(), None);
        }
    }

    #[test]
    fn dropping_a_nonempty_ring_releases_elements() {
        let token = Arc::new(());
        {
            let ring: RingBuffer<Arc<()>, 8> = RingBuffer::new();
            for _ in 0..5 {
                ring.try_push(Arc::clone(&token)).unwrap();
            }
            ring.try_pop().unwrap();
            assert_eq!(Arc::strong_count(&token), 5);
        }
        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn non_power_of_two_capacity_panics() {
        let _ = RingBuffer::<u8, 6>::new();
    }

    #[test]
    fn two_thread_handoff_preserves_the_sum() {
        use std::thread;

        const N: u64 = 100_000;
        let ring: Arc<RingBuffer<u64, 256>> = Arc::new(RingBuffer::new());
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                for i in 0..N {
                    let mut item = i;
                    loop {
                        match ring.try_push(item) {
                            Ok(()) => break,
                            Err(full) => {
                                item = full.into_inner();
                                thread::yield_now();
                            }
                        }
                    }
                }
            })
        };
        let consumer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut sum = 0u64;
                let mut received = 0u64;
                while received < N {
                    if let Some(v) = ring.try_pop() {
                        sum += v;
                        received += 1;
                    } else {
                        thread::yield_now();
                    }
                }
                sum
            })
        };
        producer.join().unwrap();
        let sum = consumer.join().unwrap();
        assert_eq!(sum, N * (N - 1) / 2);
    }
}
