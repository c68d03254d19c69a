#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! The driver-facing surface is the [`policy::Cache`] trait plus the
//! [`policy::create`] registry:
//!
//! ```rust
//! use webcache_rs::{policy, Cache, Request};
//!
//! let mut cache = policy::create("LRU").unwrap();
//! cache.set_size(3);
//!
//! for id in [1u64, 2, 3, 1, 4, 2] {
//!     let req = Request::new(id, 1);
//!     if !cache.lookup(&req) {
//!         cache.admit(&req);
//!     }
//! }
//! ```
//!
//! Every policy follows the same lifecycle: construct, `set_size` once,
//! zero or more `set_par` calls, then a stream of `lookup`/`admit`-on-miss
//! requests. Byte accounting is entirely the policy's responsibility.

/// Request and object identity.
///
/// A trace record is an `(id, size)` pair. Two requests refer to the same
/// object iff their ids match; sizes are re-read at admission time.
pub mod request;

/// Doubly linked list implementation with in-place editing capabilities.
///
/// Recency order for the LRU family. Internal infrastructure: it exposes
/// unsafe raw pointer operations that require careful invariant maintenance,
/// so it stays crate-private.
pub(crate) mod list;

/// Frequency sketches: pairwise hash family, Count-Min sketch, doorkeeper.
pub mod sketch;

/// Least Recently Used (LRU) core and the LRU/FIFO policies.
pub mod lru;

/// Admission-predicate variants of LRU: Filter, ThLRU, ExpLRU.
pub mod admission;

/// AdaptSize: ExpLRU with periodic re-optimisation of the admission constant.
pub mod adaptsize;

/// S4LRU: four stacked LRU segments with promote-on-hit, demote-on-evict.
pub mod s4lru;

/// Segmented LRU guarded by a Count-Min sketch and a doorkeeper.
pub mod slru;

/// Flat TinyLFU: LRU eviction arbitrated by a Count-Min frequency duel.
pub mod tinylfu;

/// W-TinyLFU: window LRU in front of an SLRU main cache, with an optional
/// hill-climbing window resizer.
pub mod wtinylfu;

/// The `Cache` trait consumed by the driver, and the policy registry.
pub mod policy;

// Re-export the value type and the driver surface
pub use adaptsize::AdaptSizeCache;
pub use admission::{ExpLruCache, FilterCache, ThLruCache};
pub use lru::{FifoCache, LruCache};
pub use policy::Cache;
pub use request::Request;
pub use s4lru::S4LruCache;
pub use slru::SlruCache;
pub use tinylfu::TinyLfuCache;
pub use wtinylfu::WTinyLfuCache;
