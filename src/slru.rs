//! Segmented LRU with a TinyLFU admission guard.
//!
//! Two LRU segments share the byte budget: **probation** (segment 0, 20%)
//! receives new objects, **protected** (segment 1, 80%) receives objects that
//! hit while on probation. A protected object displaced to make room demotes
//! back to probation, recursively, so real evictions leave through
//! probation's tail.
//!
//! The cache also owns a Count-Min sketch and a doorkeeper, both sized from
//! the byte budget. They arbitrate [`SlruCache::admit_from_window`], the
//! entry point W-TinyLFU uses: when probation is full, the candidate must
//! beat the would-be victim's combined sketch + doorkeeper frequency to
//! displace it.
//!
//! Standalone `SLRU` (driven directly through the [`Cache`] trait) admits
//! unconditionally into probation; the sketch machinery only participates
//! when a W-TinyLFU wrapper feeds it.

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;
use crate::sketch::{CountMinSketch, Doorkeeper, DEFAULT_SKETCH_SEED};

/// Probation segment index.
const PROBATION: usize = 0;
/// Protected segment index.
const PROTECTED: usize = 1;

/// Sketch depth for both the Count-Min sketch and the doorkeeper.
const SKETCH_DEPTH: usize = 4;

/// Row-min value at which a sketch update triggers a doorkeeper reset.
const DOORKEEPER_RESET_ESTIMATE: u64 = 15;

/// Two-segment LRU with Count-Min sketch and doorkeeper.
#[derive(Debug)]
pub struct SlruCache {
    segments: [LruCore; 2],
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
    capacity: u64,
}

impl SlruCache {
    pub fn new() -> Self {
        SlruCache {
            segments: [LruCore::new(), LruCore::new()],
            sketch: CountMinSketch::new(1, SKETCH_DEPTH, DEFAULT_SKETCH_SEED),
            doorkeeper: Doorkeeper::new(1, SKETCH_DEPTH, DEFAULT_SKETCH_SEED),
            capacity: 0,
        }
    }

    /// Configured byte budget across both segments.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Sum of resident object sizes across both segments.
    pub fn current_bytes(&self) -> u64 {
        self.segments[PROBATION].current_bytes() + self.segments[PROTECTED].current_bytes()
    }

    /// Resident bytes of one segment.
    pub fn segment_current(&self, idx: usize) -> u64 {
        self.segments[idx].current_bytes()
    }

    /// Byte budget of one segment.
    pub fn segment_capacity(&self, idx: usize) -> u64 {
        self.segments[idx].capacity()
    }

    /// True if `size` more bytes fit in the given segment.
    pub(crate) fn segment_fits(&self, idx: usize, size: u64) -> bool {
        self.segments[idx].fits(size)
    }

    /// Admits into segment `idx`; displaced protected tails demote to
    /// probation recursively, exactly as higher S4LRU segments do.
    pub(crate) fn segment_admit(&mut self, idx: usize, req: &Request) {
        if idx == PROBATION {
            self.segments[PROBATION].admit(req);
            return;
        }
        while !self.segments[idx].fits(req.size) {
            match self.segments[idx].evict_lru() {
                Some(victim) => self.segment_admit(idx - 1, &victim),
                None => break,
            }
        }
        self.segments[idx].admit(req);
    }

    /// Sketch-guarded admission used by W-TinyLFU for objects the window
    /// displaced. With room on probation the object enters directly;
    /// otherwise probation's tail is evicted and the two compete on combined
    /// sketch + doorkeeper frequency. The loser stays out.
    pub fn admit_from_window(&mut self, req: &Request) {
        if req.size > self.segments[PROBATION].capacity() {
            tracing::debug!(id = req.id, size = req.size, "object exceeds probation size, not admitted");
            return;
        }
        if self.segments[PROBATION].fits(req.size) {
            self.segments[PROBATION].admit(req);
            return;
        }
        match self.segments[PROBATION].evict_lru() {
            None => self.segments[PROBATION].admit(req),
            Some(victim) => {
                let victim_freq =
                    self.sketch.estimate(victim.id) + self.doorkeeper.estimate(victim.id);
                let candidate_freq =
                    self.sketch.estimate(req.id) + self.doorkeeper.estimate(req.id);
                if victim_freq > candidate_freq {
                    tracing::trace!(victim = victim.id, candidate = req.id, victim_freq, candidate_freq, "victim reinstated");
                    self.segments[PROBATION].admit(&victim);
                } else {
                    self.segments[PROBATION].admit(req);
                }
            }
        }
    }

    /// Increments the candidate's sketch count; when the fresh row-min
    /// reaches the reset threshold the doorkeeper's epoch ends.
    pub fn update_cm(&mut self, id: u64) {
        let estimate = self.sketch.update(id, 1);
        if estimate == DOORKEEPER_RESET_ESTIMATE {
            self.doorkeeper.reset();
        }
    }

    /// Marks the id in the doorkeeper.
    pub fn update_doorkeeper(&mut self, id: u64) {
        self.doorkeeper.update(id);
    }

    /// True if the doorkeeper has seen the id since its last reset.
    pub fn doorkeeper_contains(&self, id: u64) -> bool {
        self.doorkeeper.contains(id)
    }

    /// Evicts the LRU tail of the chosen segment, yielding the owned slot.
    pub fn evict_return(&mut self, idx: usize) -> Option<Request> {
        self.segments[idx].evict_lru()
    }
}

impl Default for SlruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for SlruCache {
    /// Partitions the budget 20/80 (remainder to probation) and sizes both
    /// sketches from it. Re-setting the size rebuilds the sketches, which
    /// resets their counts.
    fn set_size(&mut self, bytes: u64) {
        let sketch_width = (bytes / 4) as usize;
        self.sketch = CountMinSketch::new(sketch_width, SKETCH_DEPTH, DEFAULT_SKETCH_SEED);
        self.doorkeeper = Doorkeeper::new(sketch_width, SKETCH_DEPTH, DEFAULT_SKETCH_SEED);

        let probation = bytes / 5;
        let protected = (u128::from(bytes) * 4 / 5) as u64;
        let remainder = bytes - probation - protected;
        self.segments[PROBATION].set_capacity(probation + remainder);
        self.segments[PROTECTED].set_capacity(protected);
        self.capacity = bytes;
        tracing::debug!(probation = probation + remainder, protected, "segments sized");
    }

    fn lookup(&mut self, req: &Request) -> bool {
        for i in [PROBATION, PROTECTED] {
            if self.segments[i].touch(req.id) {
                if i == PROBATION {
                    // graduate to the protected segment
                    self.segments[PROBATION].evict_id(req.id);
                    self.segment_admit(PROTECTED, req);
                }
                return true;
            }
        }
        false
    }

    fn admit(&mut self, req: &Request) {
        self.segments[PROBATION].admit(req);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, size: u64) -> Request {
        Request::new(id, size)
    }

    #[test]
    fn test_segment_partition() {
        let mut cache = SlruCache::new();
        cache.set_size(10);
        assert_eq!(cache.segment_capacity(PROBATION), 2);
        assert_eq!(cache.segment_capacity(PROTECTED), 8);

        // Remainder goes to probation
        let mut cache = SlruCache::new();
        cache.set_size(7);
        assert_eq!(cache.segment_capacity(PROBATION), 2);
        assert_eq!(cache.segment_capacity(PROTECTED), 5);
    }

    #[test]
    fn test_hit_graduates_to_protected() {
        let mut cache = SlruCache::new();
        cache.set_size(10);

        cache.admit(&req(1, 1));
        assert_eq!(cache.segment_current(PROBATION), 1);

        assert!(cache.lookup(&req(1, 1)));
        assert_eq!(cache.segment_current(PROBATION), 0);
        assert_eq!(cache.segment_current(PROTECTED), 1);

        // Further hits stay protected
        assert!(cache.lookup(&req(1, 1)));
        assert_eq!(cache.segment_current(PROTECTED), 1);
    }

    #[test]
    fn test_protected_overflow_demotes_to_probation() {
        let mut cache = SlruCache::new();
        cache.set_size(10); // probation 2, protected 8

        for id in 1..=8u64 {
            cache.admit(&req(id, 2));
            assert!(cache.lookup(&req(id, 2)), "graduate id {id}");
        }
        // Protected holds 4 objects of 2 bytes; each graduation past that
        // demoted an older one through probation
        assert!(cache.segment_current(PROTECTED) <= 8);
        assert!(cache.segment_current(PROBATION) <= 2);
        assert_eq!(
            cache.current_bytes(),
            cache.segment_current(PROBATION) + cache.segment_current(PROTECTED)
        );
    }

    #[test]
    fn test_admit_from_window_prefers_frequent_victim() {
        let mut cache = SlruCache::new();
        cache.set_size(100); // probation 20

        // Resident object 1 with a strong frequency history
        cache.admit(&req(1, 20));
        for _ in 0..5 {
            cache.update_cm(1);
        }

        // Cold candidate loses the duel: victim is reinstated
        cache.admit_from_window(&req(2, 20));
        assert!(cache.lookup(&req(1, 20)), "frequent victim kept");
        // The re-hit above graduated 1 to protected, leaving probation empty
        assert_eq!(cache.segment_current(PROBATION), 0);
    }

    #[test]
    fn test_admit_from_window_prefers_frequent_candidate() {
        let mut cache = SlruCache::new();
        cache.set_size(100);

        cache.admit(&req(1, 20));
        for _ in 0..5 {
            cache.update_cm(2);
        }

        cache.admit_from_window(&req(2, 20));
        assert!(cache.lookup(&req(2, 20)), "frequent candidate admitted");
        assert!(!cache.lookup(&req(1, 20)), "cold victim stays evicted");
    }

    #[test]
    fn test_admit_from_window_with_room_skips_duel() {
        let mut cache = SlruCache::new();
        cache.set_size(10);
        cache.admit_from_window(&req(5, 1));
        assert_eq!(cache.segment_current(PROBATION), 1);
    }

    #[test]
    fn test_update_cm_resets_doorkeeper_at_threshold() {
        let mut cache = SlruCache::new();
        cache.set_size(100);

        cache.update_doorkeeper(7);
        assert!(cache.doorkeeper_contains(7));

        for _ in 0..DOORKEEPER_RESET_ESTIMATE {
            cache.update_cm(42);
        }
        assert!(!cache.doorkeeper_contains(7), "epoch ended at the reset threshold");
    }
}
