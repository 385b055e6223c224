//! Shared trait surface for the queue family.
//!
//! Both queues expose the same non-blocking contract: an enqueue that either
//! takes the element or hands it back, and a dequeue that returns `None` when
//! nothing is available. [`ConcurrentQueue`] captures that contract so
//! benchmarks and stress harnesses can run generically against either
//! implementation.
//!
//! | Implementor    | `try_enqueue` fails when | `try_dequeue` fails when |
//! |----------------|--------------------------|--------------------------|
//! | `RingBuffer`   | all slots occupied       | all slots empty          |
//! | `LinkedQueue`  | never                    | queue empty              |

use crate::error::Full;

/// Non-blocking multi-producer multi-consumer queue.
///
/// All methods take `&self` and are safe to call from any number of threads
/// concurrently. Neither operation blocks or spins on the caller's behalf;
/// callers that want to wait layer their own backoff on top.
pub trait ConcurrentQueue<T>: Send + Sync {
    /// Attempts to enqueue `value`, returning it inside [`Full`] if the queue
    /// cannot accept it right now.
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>>;

    /// Attempts to dequeue one element. Returns `None` when the queue is
    /// observed empty.
    fn try_dequeue(&self) -> Option<T>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{LinkedQueue, RingBuffer};

    fn roundtrip<Q: ConcurrentQueue<u64>>(queue: &Q) {
        for i in 0..16u64 {
            queue.try_enqueue(i).unwrap();
        }
        let mut sum = 0;
        while let Some(v) = queue.try_dequeue() {
            sum += v;
        }
        assert_eq!(sum, (0..16u64).sum());
    }

    #[test]
    fn ring_satisfies_queue_contract() {
        let ring: RingBuffer<u64, 32> = RingBuffer::new();
        roundtrip(&ring);
    }

    #[test]
    fn linked_satisfies_queue_contract() {
        let queue: LinkedQueue<u64> = LinkedQueue::new();
        roundtrip(&queue);
    }
}
