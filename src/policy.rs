//! The driver-facing policy surface and the policy registry.
//!
//! A policy is constructed with zero bytes used, receives [`Cache::set_size`]
//! exactly once, then zero or more [`Cache::set_par`] calls, and finally a
//! stream of requests driven as `lookup`, then `admit` on a miss. The
//! registry maps policy names to constructors; it is the only process-wide
//! table and is never mutated after startup.

use crate::adaptsize::AdaptSizeCache;
use crate::admission::{ExpLruCache, FilterCache, ThLruCache};
use crate::lru::{FifoCache, LruCache};
use crate::request::Request;
use crate::s4lru::S4LruCache;
use crate::slru::SlruCache;
use crate::tinylfu::TinyLfuCache;
use crate::wtinylfu::WTinyLfuCache;

/// Operations every policy exposes to the driver.
pub trait Cache {
    /// Sets the byte budget. Called exactly once, before any request.
    /// Segmented policies partition the budget and size their sketches here.
    fn set_size(&mut self, bytes: u64);

    /// Sets a named parameter. Unknown names are diagnosed to stderr and
    /// ignored; they are never fatal.
    fn set_par(&mut self, name: &str, value: &str) {
        let _ = value;
        tracing::warn!(parameter = name, "unrecognized parameter");
    }

    /// Returns true iff the object is present. Policies update their recency
    /// and frequency state here.
    fn lookup(&mut self, req: &Request) -> bool;

    /// Offers a missed object for admission. The policy may evict to make
    /// room, or decline silently. Callers must only admit after a missed
    /// `lookup` of the same request.
    fn admit(&mut self, req: &Request);
}

/// Names accepted by [`create`], in registration order.
pub const POLICY_NAMES: &[&str] = &[
    "LRU",
    "FIFO",
    "Filter",
    "ThLRU",
    "ExpLRU",
    "AdaptSize",
    "S4LRU",
    "SLRU",
    "TinyLFU",
    "W_TinyLFU",
];

/// Instantiates a policy by name, or `None` for unknown names.
pub fn create(name: &str) -> Option<Box<dyn Cache>> {
    match name {
        "LRU" => Some(Box::new(LruCache::new())),
        "FIFO" => Some(Box::new(FifoCache::new())),
        "Filter" => Some(Box::new(FilterCache::new())),
        "ThLRU" => Some(Box::new(ThLruCache::new())),
        "ExpLRU" => Some(Box::new(ExpLruCache::new())),
        "AdaptSize" => Some(Box::new(AdaptSizeCache::new())),
        "S4LRU" => Some(Box::new(S4LruCache::new())),
        "SLRU" => Some(Box::new(SlruCache::new())),
        "TinyLFU" => Some(Box::new(TinyLfuCache::new())),
        "W_TinyLFU" => Some(Box::new(WTinyLfuCache::new())),
        _ => None,
    }
}
