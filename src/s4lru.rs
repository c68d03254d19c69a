//! S4LRU: four stacked LRU segments.
//!
//! Objects enter at segment 0. A hit in segment `i < 3` promotes the object
//! to segment `i + 1`; making room in a higher segment demotes that segment's
//! LRU tail to the segment below, recursively. Eviction out of the cache only
//! ever happens from segment 0's tail.
//!
//! ```text
//! admit ──▶ [segment 0] ──hit──▶ [segment 1] ──hit──▶ [segment 2] ──hit──▶ [segment 3]
//!               ▲  │ demote          ▲  │ demote          ▲  │ demote          │
//!               │  ▼                 │  ▼                 │  ▼                 │
//!             evict ◀────────────────┴────────────────────┴────────────────────┘
//! ```
//!
//! Each segment gets a quarter of the byte budget; the division remainder
//! goes to segment 0. The per-segment byte invariants hold individually, and
//! the composite total equals their sum.

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;

const SEGMENTS: usize = 4;

/// Four independent LRU cores with promote-on-hit, demote-on-evict.
#[derive(Debug)]
pub struct S4LruCache {
    segments: [LruCore; SEGMENTS],
}

impl S4LruCache {
    pub fn new() -> Self {
        S4LruCache {
            segments: [LruCore::new(), LruCore::new(), LruCore::new(), LruCore::new()],
        }
    }

    /// Admits into segment `idx`, demoting that segment's tail downward
    /// until the object fits. Segment 0 admits with plain LRU eviction.
    fn segment_admit(&mut self, idx: usize, req: &Request) {
        if idx == 0 {
            self.segments[0].admit(req);
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

    /// Sum of resident object sizes across all segments.
    pub fn current_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.current_bytes()).sum()
    }

    #[cfg(test)]
    pub(crate) fn segment_bytes(&self, idx: usize) -> (u64, u64) {
        (self.segments[idx].current_bytes(), self.segments[idx].capacity())
    }
}

impl Default for S4LruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for S4LruCache {
    fn set_size(&mut self, bytes: u64) {
        let quarter = bytes / SEGMENTS as u64;
        for (idx, segment) in self.segments.iter_mut().enumerate() {
            segment.set_capacity(quarter);
            tracing::debug!(segment = idx, capacity = quarter, "segment sized");
        }
        let remainder = bytes - quarter * SEGMENTS as u64;
        if remainder > 0 {
            self.segments[0].set_capacity(quarter + remainder);
            tracing::debug!(segment = 0usize, capacity = quarter + remainder, "remainder granted to segment 0");
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        for i in 0..SEGMENTS {
            if self.segments[i].touch(req.id) {
                if i < SEGMENTS - 1 {
                    // move up
                    self.segments[i].evict_id(req.id);
                    self.segment_admit(i + 1, req);
                }
                return true;
            }
        }
        false
    }

    fn admit(&mut self, req: &Request) {
        self.segments[0].admit(req);
    }
}
