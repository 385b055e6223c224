//! Unbounded MPMC queue with safe memory reclamation.
//!
//! A Michael-Scott linked list: `head` points at a sentinel whose successor
//! is the true front, `tail` is a hint that may lag one node behind the real
//! end. Producers link a node after the observed tail and then help swing
//! `tail` forward; consumers swing `head` to the front node, move its payload
//! out, and the old sentinel becomes garbage.
//!
//! That garbage is the hard part. A consumer that lost the `head` race may
//! still be reading the old sentinel, so it cannot be freed inline. Every
//! operation runs under an epoch guard and unlinked sentinels are retired
//! through the queue's [`EpochDomain`](super::epoch), which recycles them
//! into per-thread free lists once no reader can still hold them. Enqueues
//! draw nodes from those free lists before touching the allocator, so a
//! steady-state queue stops allocating entirely.
//!
//! Items enqueued by one producer are dequeued in that producer's order.
//! Across producers the queue is linearizable but not ordered by wall clock.

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crossbeam_utils::CachePadded;

use super::epoch::EpochDomain;
use crate::error::Full;
use crate::traits::ConcurrentQueue;

pub(super) struct Node<T> {
    pub(super) value: UnsafeCell<Option<T>>,
    pub(super) next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    pub(super) fn empty() -> Box<Self> {
        Box::new(Node {
            value: UnsafeCell::new(None),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }
}

/// Unbounded multi-producer multi-consumer queue.
///
/// `push` always succeeds; `try_pop` returns `None` on an observed-empty
/// queue. Both are lock-free.
///
/// # Example
///
/// ```
/// use synckit::queue::LinkedQueue;
///
/// let queue = LinkedQueue::new();
/// queue.push(1);
/// queue.push(2);
/// assert_eq!(queue.try_pop(), Some(1));
/// assert_eq!(queue.try_pop(), Some(2));
/// assert_eq!(queue.try_pop(), None);
/// ```
pub struct LinkedQueue<T> {
    head: CachePadded<AtomicPtr<Node<T>>>,
    tail: CachePadded<AtomicPtr<Node<T>>>,
    domain: EpochDomain<T>,
}

// SAFETY: payloads move between threads through the queue, and all shared
// node accesses go through the atomics; retired nodes stay quarantined by
// the epoch domain until no reader can hold them.
unsafe impl<T: Send> Send for LinkedQueue<T> {}
unsafe impl<T: Send> Sync for LinkedQueue<T> {}

impl<T> LinkedQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let sentinel = Box::into_raw(Node::empty());
        LinkedQueue {
            head: CachePadded::new(AtomicPtr::new(sentinel)),
            tail: CachePadded::new(AtomicPtr::new(sentinel)),
            domain: EpochDomain::new(),
        }
    }

    /// Enqueues `value` at the back.
    pub fn push(&self, value: T) {
        let node = self.make_node(value);
        let _guard = self.domain.pin();
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            // SAFETY: the guard keeps any node reachable through `tail`
            // from being recycled while we read it.
            let next = unsafe { (*tail).next.load(Ordering::Acquire) };
            if next.is_null() {
                let link = unsafe {
                    (*tail).next.compare_exchange_weak(
                        ptr::null_mut(),
                        node,
                        Ordering::Release,
                        Ordering::Relaxed,
                    )
                };
                if link.is_ok() {
                    let _ = self.tail.compare_exchange_weak(
                        tail,
                        node,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    return;
                }
            } else {
                // help a stalled producer move the hint forward
                let _ = self.tail.compare_exchange_weak(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
            }
        }
    }

    /// Dequeues the front element. Returns `None` when the queue is observed
    /// empty.
    pub fn try_pop(&self) -> Option<T> {
        let _guard = self.domain.pin();
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);
            // SAFETY: guarded, as in `push`.
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            if next.is_null() {
                return None;
            }
            if head == tail {
                let _ = self.tail.compare_exchange_weak(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                );
                continue;
            }
            if self
                .head
                .compare_exchange_weak(head, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                // SAFETY: the head CAS made `next` the new sentinel; only
                // the winning consumer takes its payload. The old sentinel
                // is unreachable from the queue and goes to quarantine.
                let value = unsafe { (*(*next).value.get()).take() };
                self.domain.retire(head);
                return value;
            }
        }
    }

    /// Returns `true` when no element is reachable.
    pub fn is_empty(&self) -> bool {
        let _guard = self.domain.pin();
        let head = self.head.load(Ordering::Acquire);
        // SAFETY: guarded, as in `push`.
        unsafe { (*head).next.load(Ordering::Acquire).is_null() }
    }

    fn make_node(&self, value: T) -> *mut Node<T> {
        let node = self.domain.acquire();
        if node.is_null() {
            Box::into_raw(Box::new(Node {
                value: UnsafeCell::new(Some(value)),
                next: AtomicPtr::new(ptr::null_mut()),
            }))
        } else {
            // SAFETY: a node handed out by `acquire` is owned by this
            // thread until it is published by `push`.
            unsafe { *(*node).value.get() = Some(value) };
            node
        }
    }
}

impl<T> Default for LinkedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LinkedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedQueue").finish_non_exhaustive()
    }
}

impl<T> Drop for LinkedQueue<T> {
    fn drop(&mut self) {
        // single-threaded teardown: free the live list, then the domain's
        // Drop drains retired nodes and both free lists
        let mut node = *self.head.get_mut();
        while !node.is_null() {
            unsafe {
                let next = *(*node).next.get_mut();
                drop(Box::from_raw(node));
                node = next;
            }
        }
    }
}

impl<T: Send> ConcurrentQueue<T> for LinkedQueue<T> {
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        self.push(value);
        Ok(())
    }

    fn try_dequeue(&self) -> Option<T> {
        self.try_pop()
    }
}
