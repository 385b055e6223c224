//! LFU cache with LRU tie-breaking.
//!
//! Evicts the least frequently used entry; among entries tied at the lowest
//! frequency, the one that has sat in that frequency band longest goes first.
//!
//! ## Architecture
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                    Mutex<LfuState<K, V>>                      │
//!   │                                                               │
//!   │   index: FxHashMap<K, slot>          one entry per key        │
//!   │   slots: Vec<Slot>  + free_list      arena of list nodes      │
//!   │   buckets: FxHashMap<freq, Bucket>   doubly linked per freq   │
//!   │   min_freq                           lowest non-empty bucket  │
//!   │                                                               │
//!   │   bucket f:  head ── ... ── tail                              │
//!   │              oldest         newest (insert/promote here)      │
//!   └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Operation      | Complexity | Effect on frequency                   |
//! |----------------|------------|---------------------------------------|
//! | `get`          | O(1)       | `f` to `f + 1`, moves to bucket tail  |
//! | `get_copy`     | O(1)       | as `get`                              |
//! | `get_locked`   | O(1)       | as `get`, holds the lock for a scope  |
//! | `put` (hit)    | O(1)       | replaces value, promotes as `get`     |
//! | `put` (miss)   | O(1)       | may evict, then inserts at `f = 1`    |
//!
//! A new entry enters the tail of bucket 1; an access moves the entry to the
//! tail of the next bucket; an eviction pops the head of the `min_freq`
//! bucket. Empty buckets are removed eagerly so `min_freq` always names a
//! non-empty bucket.
//!
//! Values are held as `Arc<V>`: `get` hands out a shared handle without
//! cloning the value and eviction cannot invalidate a handle already given
//! out. One mutex serializes all operations; the cache makes no lock-free
//! claims. Wrap hot read paths behind [`get_copy`](LfuCache::get_copy) if
//! holding `Arc`s is undesirable.

use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

struct Entry<K, V> {
    key: K,
    value: Arc<V>,
    freq: u64,
}

struct Slot<K, V> {
    entry: Option<Entry<K, V>>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Default)]
struct Bucket {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

struct LfuState<K, V> {
    slots: Vec<Slot<K, V>>,
    free_list: Vec<usize>,
    index: FxHashMap<K, usize>,
    buckets: FxHashMap<u64, Bucket>,
    min_freq: u64,
    len: usize,
    capacity: usize,
}

/// Frequency-keyed cache with FIFO tie-breaking inside each frequency band.
///
/// See the module documentation for the eviction discipline.
pub struct LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    state: Mutex<LfuState<K, V>>,
}

/// Scoped handle returned by [`LfuCache::get_locked`].
///
/// Holds the cache mutex for its whole lifetime alongside a shared handle to
/// the value, so the entry cannot be evicted or replaced while the handle is
/// alive. Dropping the handle releases the lock. Calling back into the same
/// cache while holding one deadlocks.
pub struct LockedEntry<'a, K, V>
where
    K: Eq + Hash + Clone,
{
    _state: MutexGuard<'a, LfuState<K, V>>,
    value: Arc<V>,
}

impl<K, V> LockedEntry<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    /// Returns the shared handle to the value.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }
}

impl<K, V> Deref for LockedEntry<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is allowed and makes every `put` a no-op.
    pub fn new(capacity: usize) -> Self {
        LfuCache {
            state: Mutex::new(LfuState {
                slots: Vec::with_capacity(capacity),
                free_list: Vec::new(),
                index: FxHashMap::default(),
                buckets: FxHashMap::default(),
                min_freq: 0,
                len: 0,
                capacity,
            }),
        }
    }

    /// Returns a shared handle to the value for `key`, promoting its
    /// frequency. Returns `None` on a miss.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut state = self.state.lock();
        let slot = *state.index.get(key)?;
        state.promote(slot);
        state.slots[slot]
            .entry
            .as_ref()
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Returns a copy of the value for `key`, promoting its frequency.
    pub fn get_copy(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.get(key).map(|value| (*value).clone())
    }

    /// Returns a handle that keeps the cache locked while it is alive.
    ///
    /// Promotes the entry like [`get`](Self::get). While the handle exists no
    /// other operation can run, so the entry cannot be evicted out from under
    /// the caller.
    pub fn get_locked(&self, key: &K) -> Option<LockedEntry<'_, K, V>> {
        let mut state = self.state.lock();
        let slot = *state.index.get(key)?;
        state.promote(slot);
        let value = state.slots[slot]
            .entry
            .as_ref()
            .map(|entry| Arc::clone(&entry.value))?;
        Some(LockedEntry {
            _state: state,
            value,
        })
    }

    /// Inserts or replaces the value for `key`.
    ///
    /// A hit replaces the value and promotes the entry; a miss at capacity
    /// first evicts the oldest entry of the least-frequent bucket. With
    /// capacity zero this is a no-op.
    pub fn put(&self, key: K, value: V) {
        self.put_arc(key, Arc::new(value));
    }

    /// [`put`](Self::put) for a value that is already shared.
    pub fn put_arc(&self, key: K, value: Arc<V>) {
        let mut state = self.state.lock();
        if state.capacity == 0 {
            return;
        }
        if let Some(&slot) = state.index.get(&key) {
            state.promote(slot);
            if let Some(entry) = state.slots[slot].entry.as_mut() {
                entry.value = value;
            }
            return;
        }
        if state.len == state.capacity {
            state.evict_min();
        }
        state.insert_new(key, value);
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Returns `true` when `key` is cached. Does not promote.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    /// Returns the access count for `key`. Does not promote.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let state = self.state.lock();
        let slot = *state.index.get(key)?;
        state.slots[slot].entry.as_ref().map(|entry| entry.freq)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let state = self.state.lock();
        assert_eq!(state.index.len(), state.len);
        assert!(state.len <= state.capacity);

        if state.len == 0 {
            assert!(state.buckets.is_empty());
            return;
        }

        assert!(state.min_freq > 0);
        assert_eq!(state.min_freq, *state.buckets.keys().min().unwrap());

        let mut walked = 0usize;
        for (&freq, bucket) in &state.buckets {
            assert!(bucket.len > 0);
            let mut current = bucket.head;
            let mut last = None;
            let mut count = 0usize;
            while let Some(slot) = current {
                let entry = state.slots[slot].entry.as_ref().expect("linked slot empty");
                assert_eq!(entry.freq, freq);
                assert_eq!(state.slots[slot].prev, last);
                assert_eq!(state.index.get(&entry.key), Some(&slot));
                last = Some(slot);
                current = state.slots[slot].next;
                count += 1;
            }
            assert_eq!(bucket.tail, last);
            assert_eq!(bucket.len, count);
            walked += count;
        }
        assert_eq!(walked, state.len);
    }
}

impl<K, V> LfuState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Moves the entry in `slot` from its bucket to the tail of the next
    /// frequency bucket.
    fn promote(&mut self, slot: usize) {
        let freq = self.slots[slot]
            .entry
            .as_ref()
            .map(|entry| entry.freq)
            .expect("promoted slot is empty");
        if freq == u64::MAX {
            return;
        }
        self.detach(freq, slot);
        if self.bucket_is_empty(freq) {
            self.buckets.remove(&freq);
            if self.min_freq == freq {
                // the entry moves to freq + 1, so the next band up is the
                // new minimum
                self.min_freq = freq + 1;
            }
        }
        if let Some(entry) = self.slots[slot].entry.as_mut() {
            entry.freq = freq + 1;
        }
        self.push_tail(freq + 1, slot);
    }

    /// Removes the head entry of the least-frequent bucket.
    fn evict_min(&mut self) {
        let Some(bucket) = self.buckets.get(&self.min_freq) else {
            return;
        };
        let Some(victim) = bucket.head else {
            return;
        };
        self.detach(self.min_freq, victim);
        if self.bucket_is_empty(self.min_freq) {
            self.buckets.remove(&self.min_freq);
        }
        let entry = self.slots[victim].entry.take().expect("victim slot empty");
        self.index.remove(&entry.key);
        self.free_list.push(victim);
        self.len -= 1;
    }

    /// Appends a fresh entry at frequency 1.
    fn insert_new(&mut self, key: K, value: Arc<V>) {
        let entry = Entry {
            key: key.clone(),
            value,
            freq: 1,
        };
        let slot = if let Some(slot) = self.free_list.pop() {
            self.slots[slot] = Slot {
                entry: Some(entry),
                prev: None,
                next: None,
            };
            slot
        } else {
            self.slots.push(Slot {
                entry: Some(entry),
                prev: None,
                next: None,
            });
            self.slots.len() - 1
        };
        self.index.insert(key, slot);
        self.push_tail(1, slot);
        self.min_freq = 1;
        self.len += 1;
    }

    fn bucket_is_empty(&self, freq: u64) -> bool {
        self.buckets
            .get(&freq)
            .map(|bucket| bucket.len == 0)
            .unwrap_or(true)
    }

    fn push_tail(&mut self, freq: u64, slot: usize) {
        let bucket = self.buckets.entry(freq).or_default();
        let old_tail = bucket.tail;
        self.slots[slot].prev = old_tail;
        self.slots[slot].next = None;
        if let Some(tail) = old_tail {
            self.slots[tail].next = Some(slot);
        } else {
            bucket.head = Some(slot);
        }
        bucket.tail = Some(slot);
        bucket.len += 1;
    }

    fn detach(&mut self, freq: u64, slot: usize) {
        let prev = self.slots[slot].prev;
        let next = self.slots[slot].next;
        let bucket = self.buckets.get_mut(&freq).expect("bucket missing");
        if let Some(prev) = prev {
            self.slots[prev].next = next;
        } else {
            bucket.head = next;
        }
        if let Some(next) = next {
            self.slots[next].prev = prev;
        } else {
            bucket.tail = prev;
        }
        bucket.len -= 1;
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }
}

impl<K, V> fmt::Debug for LfuCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LfuCache")
            .field("len", &state.len)
            .field("capacity", &state.capacity)
            .finish()
    }
}
