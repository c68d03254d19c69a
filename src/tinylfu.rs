//! Flat TinyLFU: an LRU store whose evictions are arbitrated by frequency.
//!
//! Every lookup feeds the Count-Min sketch, so the sketch approximates the
//! request frequency of the whole trace, resident or not. On admission the
//! LRU tail is offered as a victim: it is evicted only while its estimated
//! frequency is *strictly below* the candidate's. A victim that ties or wins
//! stays, and the candidate is dropped — an unpopular newcomer cannot
//! displace a proven object.
//!
//! The sketch is sized from the byte budget (target width `capacity / 2`,
//! depth 2).

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;
use crate::sketch::{CountMinSketch, DEFAULT_SKETCH_SEED};

const SKETCH_DEPTH: usize = 2;

/// LRU with Count-Min-guarded admission.
#[derive(Debug)]
pub struct TinyLfuCache {
    core: LruCore,
    sketch: CountMinSketch,
}

impl TinyLfuCache {
    pub fn new() -> Self {
        TinyLfuCache {
            core: LruCore::new(),
            sketch: CountMinSketch::new(1, SKETCH_DEPTH, DEFAULT_SKETCH_SEED),
        }
    }

    /// Sum of resident object sizes.
    pub fn current_bytes(&self) -> u64 {
        self.core.current_bytes()
    }

    /// Offers the LRU tail as an eviction victim against the candidate.
    /// Returns true if the victim's frequency lost and it was evicted.
    fn evict_victim(&mut self, candidate_id: u64) -> bool {
        let Some(victim) = self.core.peek_lru() else {
            return false;
        };
        let victim_freq = self.sketch.estimate(victim.id);
        let candidate_freq = self.sketch.estimate(candidate_id);
        if victim_freq < candidate_freq {
            self.core.evict_lru();
            true
        } else {
            tracing::trace!(victim = victim.id, candidate = candidate_id, victim_freq, candidate_freq, "victim outranks candidate, admission refused");
            false
        }
    }
}

impl Default for TinyLfuCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for TinyLfuCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
        self.sketch = CountMinSketch::new((bytes / 2) as usize, SKETCH_DEPTH, DEFAULT_SKETCH_SEED);
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.sketch.update(req.id, 1);
        self.core.touch(req.id)
    }

    /// Admits iff the frequency duels cleared enough room: the first victim
    /// that outranks the candidate aborts the admission.
    fn admit(&mut self, req: &Request) {
        if req.size > self.core.capacity() {
            tracing::debug!(id = req.id, size = req.size, capacity = self.core.capacity(), "object exceeds cache size, not admitted");
            return;
        }
        let mut cleared = true;
        while !self.core.fits(req.size) {
            cleared = self.evict_victim(req.id);
            if !cleared {
                break;
            }
        }
        if cleared {
            self.core.admit(req);
        }
    }
}
