//! Least Recently Used (LRU) core and policies.
//!
//! The recency machinery shared by most policies in this crate: a doubly
//! linked list ordered most-recent-first, paired with an id → node index for
//! O(1) lookup, splice-to-front, and removal.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         LruCore                                 │
//! │                                                                 │
//! │  HashMap<id, *Node>         Doubly-Linked List                  │
//! │  ┌──────────────┐          ┌──────────────────────────────┐     │
//! │  │ 17 ───────────────────▶ │ MRU ◀──▶ ... ◀──▶ LRU       │     │
//! │  │ 42 ───────────────────▶ │  ▲                    │      │     │
//! │  │ 99 ───────────────────▶ │  │                    ▼      │     │
//! │  └──────────────┘          │ head              tail       │     │
//! │                            └──────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Accounting is in **bytes**: `current_bytes` is the sum of resident object
//! sizes and never exceeds the configured capacity. Admission evicts from the
//! tail until the new object fits; an object larger than the whole budget is
//! declined silently. There is no entry-count limit.
//!
//! Two policies live here:
//!
//! - [`LruCache`]: a hit splices the object to the MRU position.
//! - [`FifoCache`]: a hit leaves the object in place, so the tail is the
//!   oldest *insertion* and eviction is first-in first-out.
//!
//! # Invariants
//!
//! After every operation:
//! - the index's keys are exactly the ids of the listed slots,
//! - `current_bytes` equals the sum of listed slot sizes,
//! - `current_bytes <= capacity`.
//!
//! Admitting an id that is already resident violates the index invariant;
//! callers must `lookup` first and only admit on a miss.

use crate::list::{Entry as ListEntry, List};
use crate::policy::Cache;
use crate::request::Request;
use hashbrown::{DefaultHashBuilder, HashMap};

/// Byte-budgeted recency list with an id index.
///
/// This is the building block for the LRU policy family and for the segments
/// of S4LRU, SLRU, and W-TinyLFU. All algorithm logic is implemented here to
/// avoid duplication across the variants.
///
/// # Safety
///
/// The `map` field stores raw pointers to list nodes. These pointers are
/// valid as long as:
/// - the pointer was obtained from `list.push_front()`,
/// - the node has not been removed from the list,
/// - the core has not been dropped.
pub(crate) struct LruCore {
    list: List<Request>,
    map: HashMap<u64, *mut ListEntry<Request>, DefaultHashBuilder>,
    /// Configured byte budget.
    capacity: u64,
    /// Sum of resident object sizes.
    current: u64,
}

impl LruCore {
    pub(crate) fn new() -> Self {
        LruCore {
            list: List::new(),
            map: HashMap::default(),
            capacity: 0,
            current: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    #[inline]
    pub(crate) fn current_bytes(&self) -> u64 {
        self.current
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sets the byte budget. Does not evict: over-budget contents drain on
    /// the next admission.
    #[inline]
    pub(crate) fn set_capacity(&mut self, bytes: u64) {
        self.capacity = bytes;
    }

    /// True if admitting `size` more bytes would stay within budget.
    #[inline]
    pub(crate) fn fits(&self, size: u64) -> bool {
        self.current + size <= self.capacity
    }

    /// Presence check with promotion to the MRU position.
    pub(crate) fn touch(&mut self, id: u64) -> bool {
        if let Some(&node) = self.map.get(&id) {
            unsafe {
                // SAFETY: node comes from our map
                self.list.move_to_front(node);
            }
            true
        } else {
            false
        }
    }

    /// Presence check without touching recency order (FIFO's hit path).
    #[inline]
    pub(crate) fn contains(&self, id: u64) -> bool {
        self.map.contains_key(&id)
    }

    /// Admits an object at the MRU position, evicting from the tail until it
    /// fits. Objects larger than the whole budget are declined.
    pub(crate) fn admit(&mut self, req: &Request) {
        if req.size > self.capacity {
            tracing::debug!(id = req.id, size = req.size, capacity = self.capacity, "object exceeds cache size, not admitted");
            return;
        }
        debug_assert!(!self.map.contains_key(&req.id), "admit of resident id {}", req.id);

        while !self.fits(req.size) {
            if self.evict_lru().is_none() {
                break;
            }
        }

        let node = self.list.push_front(*req);
        self.map.insert(req.id, node);
        self.current += req.size;
        tracing::trace!(id = req.id, size = req.size, current = self.current, "admit");
    }

    /// Removes the object with the given id, if present.
    pub(crate) fn evict_id(&mut self, id: u64) {
        if let Some(node) = self.map.remove(&id) {
            unsafe {
                // SAFETY: node comes from our map
                if let Some(entry) = self.list.remove(node) {
                    let slot = entry.into_value();
                    self.current -= slot.size;
                    tracing::trace!(id = slot.id, size = slot.size, current = self.current, "evict");
                }
            }
        }
    }

    /// Removes and returns the least recently used object. The caller owns
    /// the returned slot and either re-admits it elsewhere or drops it.
    pub(crate) fn evict_lru(&mut self) -> Option<Request> {
        let entry = self.list.remove_last()?;
        // SAFETY: entries from remove_last hold initialized slots
        let slot = unsafe { entry.into_value() };
        self.map.remove(&slot.id);
        self.current -= slot.size;
        tracing::trace!(id = slot.id, size = slot.size, current = self.current, "evict");
        Some(slot)
    }

    /// Returns a copy of the least recently used slot without removing it.
    pub(crate) fn peek_lru(&self) -> Option<Request> {
        self.list.peek_last().copied()
    }

    /// Admits an object and returns the slots displaced to make room. Used
    /// by the W-TinyLFU window, which hands its victims to the main cache.
    pub(crate) fn admit_with_return(&mut self, req: &Request) -> Vec<Request> {
        let mut victims = Vec::new();
        if req.size > self.capacity {
            tracing::debug!(id = req.id, size = req.size, capacity = self.capacity, "object exceeds window size, not admitted");
            return victims;
        }
        while !self.fits(req.size) {
            match self.evict_lru() {
                Some(victim) => victims.push(victim),
                None => break,
            }
        }
        let node = self.list.push_front(*req);
        self.map.insert(req.id, node);
        self.current += req.size;
        victims
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        assert!(self.current <= self.capacity || self.list.is_empty());
        assert_eq!(self.map.len(), self.list.len());
    }
}

impl std::fmt::Debug for LruCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCore")
            .field("capacity", &self.capacity)
            .field("current", &self.current)
            .field("len", &self.map.len())
            .finish()
    }
}

/// Least Recently Used eviction: hits promote to the MRU position, eviction
/// takes the least recently *used* object.
#[derive(Debug)]
pub struct LruCache {
    core: LruCore,
}

impl LruCache {
    pub fn new() -> Self {
        LruCache { core: LruCore::new() }
    }

    /// Sum of resident object sizes.
    pub fn current_bytes(&self) -> u64 {
        self.core.current_bytes()
    }

    /// Number of resident objects.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Returns `true` if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.core.is_empty()
    }
}

impl Default for LruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for LruCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.core.touch(req.id)
    }

    fn admit(&mut self, req: &Request) {
        self.core.admit(req);
    }
}

/// First-In First-Out eviction: structurally an LRU whose hits do not
/// promote, so the tail is always the oldest insertion.
#[derive(Debug)]
pub struct FifoCache {
    core: LruCore,
}

impl FifoCache {
    pub fn new() -> Self {
        FifoCache { core: LruCore::new() }
    }

    /// Sum of resident object sizes.
    pub fn current_bytes(&self) -> u64 {
        self.core.current_bytes()
    }
}

impl Default for FifoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for FifoCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.core.contains(req.id)
    }

    fn admit(&mut self, req: &Request) {
        self.core.admit(req);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, size: u64) -> Request {
        Request::new(id, size)
    }

    #[test]
    fn test_lru_hit_promotes() {
        let mut cache = LruCache::new();
        cache.set_size(3);

        // Trace: 1 2 3 1 4 2 with unit sizes
        let mut hits = 0;
        for id in [1u64, 2, 3, 1, 4, 2] {
            let r = req(id, 1);
            if cache.lookup(&r) {
                hits += 1;
            } else {
                cache.admit(&r);
            }
            cache.core.assert_invariants();
        }
        // The hit promotes 1, leaving 2 as the least recently used object;
        // 4 evicts it, so only the re-hit on 1 counts
        assert_eq!(hits, 1);
        assert!(cache.lookup(&req(2, 1)), "2 was re-admitted after its miss");
        assert_eq!(cache.current_bytes(), 3);
        assert_eq!(cache.len(), 3);
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_fifo_hit_does_not_promote() {
        let mut cache = FifoCache::new();
        cache.set_size(3);

        let mut hits = 0;
        for id in [1u64, 2, 3, 1, 4, 2] {
            let r = req(id, 1);
            if cache.lookup(&r) {
                hits += 1;
            } else {
                cache.admit(&r);
            }
        }
        // Insertion order decides: the hit on 1 does not protect it, so 4
        // evicts 1 and the later request for 2 still hits
        assert_eq!(hits, 2);
        assert_eq!(cache.current_bytes(), 3, "cache stays full at the byte budget");
    }

    #[test]
    fn test_byte_accounting() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        core.admit(&req(1, 4));
        core.admit(&req(2, 4));
        assert_eq!(core.current_bytes(), 8);

        // 3 needs 4 bytes: 1 is the tail and goes first
        core.admit(&req(3, 4));
        assert_eq!(core.current_bytes(), 8);
        assert!(!core.contains(1));
        assert!(core.contains(2));
        core.assert_invariants();
    }

    #[test]
    fn test_oversized_object_declined() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        core.admit(&req(1, 4));
        core.admit(&req(2, 11));
        assert!(!core.contains(2));
        assert_eq!(core.current_bytes(), 4, "resident contents untouched");
    }

    #[test]
    fn test_evict_lru_returns_owned_slot() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        core.admit(&req(1, 2));
        core.admit(&req(2, 3));

        let victim = core.evict_lru().unwrap();
        assert_eq!(victim, req(1, 2));
        assert_eq!(core.current_bytes(), 3);

        core.evict_lru().unwrap();
        assert!(core.evict_lru().is_none());
        assert_eq!(core.current_bytes(), 0);
    }

    #[test]
    fn test_evict_id_is_noop_when_absent() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        core.admit(&req(1, 2));
        core.evict_id(7);
        assert_eq!(core.current_bytes(), 2);
        core.evict_id(1);
        assert_eq!(core.current_bytes(), 0);
        assert!(core.is_empty());
    }

    #[test]
    fn test_peek_lru_does_not_remove() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        assert!(core.peek_lru().is_none());
        core.admit(&req(1, 2));
        core.admit(&req(2, 3));
        assert_eq!(core.peek_lru(), Some(req(1, 2)));
        assert_eq!(core.len(), 2);
    }

    #[test]
    fn test_admit_with_return_reports_victims() {
        let mut core = LruCore::new();
        core.set_capacity(4);
        core.admit(&req(1, 2));
        core.admit(&req(2, 2));

        let victims = core.admit_with_return(&req(3, 3));
        assert_eq!(victims, vec![req(1, 2), req(2, 2)]);
        assert_eq!(core.current_bytes(), 3);
        core.assert_invariants();
    }

    #[test]
    fn test_size_change_treated_as_new_object() {
        let mut core = LruCore::new();
        core.set_capacity(10);
        core.admit(&req(1, 2));
        core.evict_id(1);
        // Same id, new size: re-admitted with the size re-read
        core.admit(&req(1, 5));
        assert_eq!(core.current_bytes(), 5);
    }
}
