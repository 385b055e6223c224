//! Epoch-based reclamation for the linked queue.
//!
//! Unlinking a node from a lock-free list does not make it free: a peer that
//! loaded the pointer just before the unlink may still be reading through it.
//! Each [`EpochDomain`] therefore keeps a global epoch counter and one record
//! per participating thread. Entering a queue operation pins the thread: the
//! record publishes the epoch it observed and raises its `active` flag, and
//! the guard clears the flag on scope exit.
//!
//! Unlinked nodes are retired into the owning thread's record together with
//! the epoch current at retirement. Once 64 nodes pile up, a scan first tries
//! to advance the global epoch (possible only when every active record has
//! observed the current one) and then recycles every retired node at least
//! two epochs old. A thread pinned before an advance still carries the old
//! epoch, so surviving two advances proves that every reader which could have
//! seen the node has since unpinned; one advance proves nothing.
//!
//! Recycled nodes do not return to the allocator. They go to the record's
//! local free list (capped at 64, overflow spills half onto a shared Treiber
//! stack) and are handed back out by [`EpochDomain::acquire`]. A node is
//! always in exactly one place: the live list, a retired list, a local free
//! list, or the global free stack.
//!
//! Records are found through a process-wide thread local that maps a domain
//! id to the record pointer, so one thread can participate in any number of
//! queues. Domain ids are never reused; a slot left behind by a dropped
//! domain can never be confused with a live one.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use super::linked::Node;

pub(super) const RETIRE_THRESHOLD: usize = 64;
pub(super) const LOCAL_FREE_LIMIT: usize = 64;

static NEXT_DOMAIN_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// (domain id, record pointer) slots for every domain this thread has
    /// touched. Scans are linear; threads rarely touch more than a handful
    /// of domains.
    static REGISTRY: RefCell<Vec<(u64, *mut ())>> = const { RefCell::new(Vec::new()) };
}

struct Retired<T> {
    node: *mut Node<T>,
    epoch: u64,
}

/// Per-thread participation record, linked into the domain's record list.
///
/// The atomics are read by peers during epoch advancement. Everything else
/// is touched only by the owning thread, or by the domain's single-threaded
/// teardown.
pub(super) struct ThreadRecord<T> {
    epoch: AtomicU64,
    active: AtomicBool,
    next: *mut ThreadRecord<T>,
    retired: UnsafeCell<Vec<Retired<T>>>,
    local_free: Cell<*mut Node<T>>,
    local_count: Cell<usize>,
}

/// Reclamation state owned by one queue instance.
pub(super) struct EpochDomain<T> {
    id: u64,
    global_epoch: CachePadded<AtomicU64>,
    records: AtomicPtr<ThreadRecord<T>>,
    free_head: CachePadded<AtomicPtr<Node<T>>>,
}

impl<T> EpochDomain<T> {
    pub(super) fn new() -> Self {
        EpochDomain {
            id: NEXT_DOMAIN_ID.fetch_add(1, Ordering::Relaxed),
            global_epoch: CachePadded::new(AtomicU64::new(0)),
            records: AtomicPtr::new(ptr::null_mut()),
            free_head: CachePadded::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// Pins the calling thread for the duration of the returned guard.
    pub(super) fn pin(&self) -> Guard<'_, T> {
        let record = unsafe { &*self.record() };
        record
            .epoch
            .store(self.global_epoch.load(Ordering::Acquire), Ordering::Release);
        record.active.store(true, Ordering::Release);
        Guard {
            record,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Hands `node` to the calling thread's retired list. Must be called
    /// while pinned, after the node became unreachable from the queue.
    pub(super) fn retire(&self, node: *mut Node<T>) {
        let record = unsafe { &*self.record() };
        let pending = {
            // SAFETY: the retired list belongs to the calling thread.
            let retired = unsafe { &mut *record.retired.get() };
            retired.push(Retired {
                node,
                epoch: self.global_epoch.load(Ordering::Relaxed),
            });
            retired.len()
        };
        if pending >= RETIRE_THRESHOLD {
            self.scan(record);
        }
    }

    /// Takes a recycled node, or null when both free lists are empty.
    pub(super) fn acquire(&self) -> *mut Node<T> {
        let record = unsafe { &*self.record() };
        let local = record.local_free.get();
        if !local.is_null() {
            unsafe {
                record.local_free.set((*local).next.load(Ordering::Relaxed));
                record.local_count.set(record.local_count.get() - 1);
                (*local).next.store(ptr::null_mut(), Ordering::Relaxed);
            }
            return local;
        }
        let global = self.pop_global();
        if !global.is_null() {
            unsafe { (*global).next.store(ptr::null_mut(), Ordering::Relaxed) };
        }
        global
    }

    fn scan(&self, record: &ThreadRecord<T>) {
        self.try_advance();
        let cur = self.global_epoch.load(Ordering::Acquire);
        // two-epoch quarantine: nothing is recycled until the epoch has
        // advanced twice past the retirement epoch
        let Some(safe_epoch) = cur.checked_sub(2) else {
            return;
        };
        // SAFETY: the retired list belongs to the calling thread.
        let retired = unsafe { &mut *record.retired.get() };
        let mut index = 0;
        while index < retired.len() {
            if retired[index].epoch <= safe_epoch {
                let entry = retired.swap_remove(index);
                self.recycle(record, entry.node);
            } else {
                index += 1;
            }
        }
    }

    /// Advances the global epoch iff every active record has observed it.
    fn try_advance(&self) {
        let cur = self.global_epoch.load(Ordering::Acquire);
        let mut record = self.records.load(Ordering::Acquire);
        while !record.is_null() {
            let r = unsafe { &*record };
            if r.active.load(Ordering::Acquire) && r.epoch.load(Ordering::Acquire) != cur {
                return;
            }
            record = r.next;
        }
        let _ = self.global_epoch.compare_exchange_weak(
            cur,
            cur + 1,
            Ordering::Release,
            Ordering::Relaxed,
        );
    }

    fn recycle(&self, record: &ThreadRecord<T>, node: *mut Node<T>) {
        // SAFETY: past quarantine, no thread can still reach `node`.
        unsafe {
            *(*node).value.get() = None;
            (*node).next.store(record.local_free.get(), Ordering::Relaxed);
        }
        record.local_free.set(node);
        record.local_count.set(record.local_count.get() + 1);
        if record.local_count.get() >= LOCAL_FREE_LIMIT {
            self.flush_local(record);
        }
    }

    /// Moves half of an overflowing local free list onto the global stack.
    fn flush_local(&self, record: &ThreadRecord<T>) {
        while !record.local_free.get().is_null() && record.local_count.get() > LOCAL_FREE_LIMIT / 2
        {
            let node = record.local_free.get();
            record
                .local_free
                .set(unsafe { (*node).next.load(Ordering::Relaxed) });
            record.local_count.set(record.local_count.get() - 1);
            self.push_global(node);
        }
    }

    fn pop_global(&self) -> *mut Node<T> {
        let mut head = self.free_head.load(Ordering::Acquire);
        while !head.is_null() {
            let next = unsafe { (*head).next.load(Ordering::Relaxed) };
            match self
                .free_head
                .compare_exchange_weak(head, next, Ordering::Acquire, Ordering::Relaxed)
            {
                Ok(_) => return head,
                Err(actual) => head = actual,
            }
        }
        ptr::null_mut()
    }

    fn push_global(&self, node: *mut Node<T>) {
        let mut head = self.free_head.load(Ordering::Relaxed);
        loop {
            unsafe { (*node).next.store(head, Ordering::Relaxed) };
            match self
                .free_head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Returns this thread's record, registering one on first touch.
    fn record(&self) -> *mut ThreadRecord<T> {
        let cached = REGISTRY.with(|slots| {
            slots
                .borrow()
                .iter()
                .find(|(id, _)| *id == self.id)
                .map(|&(_, record)| record as *mut ThreadRecord<T>)
        });
        match cached {
            Some(record) => record,
            None => self.register(),
        }
    }

    #[cold]
    fn register(&self) -> *mut ThreadRecord<T> {
        let record = Box::into_raw(Box::new(ThreadRecord {
            epoch: AtomicU64::new(0),
            active: AtomicBool::new(false),
            next: ptr::null_mut(),
            retired: UnsafeCell::new(Vec::new()),
            local_free: Cell::new(ptr::null_mut()),
            local_count: Cell::new(0),
        }));
        let mut head = self.records.load(Ordering::Acquire);
        loop {
            unsafe { (*record).next = head };
            match self
                .records
                .compare_exchange_weak(head, record, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        REGISTRY.with(|slots| slots.borrow_mut().push((self.id, record as *mut ())));
        record
    }
}

impl<T> Drop for EpochDomain<T> {
    fn drop(&mut self) {
        // teardown is single-threaded: no operation is in flight and no
        // guard is alive
        unsafe {
            let mut record = *self.records.get_mut();
            while !record.is_null() {
                let next = (*record).next;
                let boxed = Box::from_raw(record);
                for entry in (*boxed.retired.get()).iter() {
                    drop(Box::from_raw(entry.node));
                }
                let mut free = boxed.local_free.get();
                while !free.is_null() {
                    let after = (*free).next.load(Ordering::Relaxed);
                    drop(Box::from_raw(free));
                    free = after;
                }
                drop(boxed);
                record = next;
            }
            let mut free = *self.free_head.get_mut();
            while !free.is_null() {
                let after = (*free).next.load(Ordering::Relaxed);
                drop(Box::from_raw(free));
                free = after;
            }
        }
    }
}

/// Scoped pin on the calling thread's record.
pub(super) struct Guard<'a, T> {
    record: &'a ThreadRecord<T>,
    _not_send: std::marker::PhantomData<*mut ()>,
}

impl<T> Drop for Guard<'_, T> {
    fn drop(&mut self) {
        self.record.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_node() -> *mut Node<u32> {
        Box::into_raw(Node::empty())
    }

    #[test]
    fn acquire_on_a_fresh_domain_is_empty() {
        let domain: EpochDomain<u32> = EpochDomain::new();
        assert!(domain.acquire().is_null());
    }

    #[test]
    fn domain_ids_are_unique() {
        let a: EpochDomain<u32> = EpochDomain::new();
        let b: EpochDomain<u32> = EpochDomain::new();
        assert_ne!(a.id, b.id);
    }

    fn advance_until(domain: &EpochDomain<u32>, target: u64) {
        // the advancing CAS is weak, so give spurious failures room to retry
        for _ in 0..1_000 {
            if domain.global_epoch.load(Ordering::Relaxed) == target {
                return;
            }
            domain.try_advance();
        }
    }

    #[test]
    fn advance_requires_active_records_to_catch_up() {
        let domain: EpochDomain<u32> = EpochDomain::new();
        let guard = domain.pin();
        // the pinned record observed epoch 0, so the first advance succeeds
        advance_until(&domain, 1);
        assert_eq!(domain.global_epoch.load(Ordering::Relaxed), 1);
        // now the record lags behind and blocks further advancement
        advance_until(&domain, 2);
        assert_eq!(domain.global_epoch.load(Ordering::Relaxed), 1);
        drop(guard);
        advance_until(&domain, 2);
        assert_eq!(domain.global_epoch.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn nothing_is_recycled_during_quarantine() {
        let domain: EpochDomain<u32> = EpochDomain::new();
        // first batch retires at epoch 0; the scan it triggers can advance
        // the epoch only to 1, so nothing may be recycled yet
        for _ in 0..RETIRE_THRESHOLD {
            domain.retire(fresh_node());
        }
        assert!(domain.acquire().is_null());
    }

    #[test]
    fn retired_nodes_come_back_after_two_advances() {
        let domain: EpochDomain<u32> = EpochDomain::new();
        for _ in 0..RETIRE_THRESHOLD {
            domain.retire(fresh_node());
        }
        // the threshold stays exceeded, so every further retirement rescans;
        // with no active guards the epoch soon reaches 2 and frees the batch
        let mut node = ptr::null_mut();
        for _ in 0..16 {
            domain.retire(fresh_node());
            node = domain.acquire();
            if !node.is_null() {
                break;
            }
        }
        assert!(!node.is_null());
        unsafe { drop(Box::from_raw(node)) };
    }

    #[test]
    fn drop_frees_retired_and_cached_nodes() {
        let domain: EpochDomain<u32> = EpochDomain::new();
        for _ in 0..10 {
            domain.retire(fresh_node());
        }
        drop(domain);
    }
}
