//! LRU variants that alter only the admission predicate.
//!
//! Each policy here keeps the full [`LruCore`] recency/eviction machinery and
//! overrides a single decision — whether a missed object is worth storing:
//!
//! | Policy | Parameter | Admit iff |
//! |--------|-----------|-----------|
//! | [`FilterCache`] | `n` (default 2) | the id has been looked up more than `n` times |
//! | [`ThLruCache`] | `t` (threshold `2^t`, default `2^19`) | `size < 2^t` |
//! | [`ExpLruCache`] | `c` (constant `2^c`, default `2^18`) | a Bernoulli trial with probability `exp(-size / 2^c)` succeeds |
//!
//! `ExpLRU` also accepts `seed` to reseed its PRNG for reproducible runs.

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;
use hashbrown::{DefaultHashBuilder, HashMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default seed for probabilistic admission, overridable via `seed=`.
pub(crate) const DEFAULT_ADMISSION_SEED: u64 = 1;

/// LRU admission gated on request frequency: an object enters the cache only
/// once it has been seen strictly more than `n` times.
#[derive(Debug)]
pub struct FilterCache {
    core: LruCore,
    n: u64,
    /// Lookup count per id, incremented on every lookup, hit or miss.
    seen: HashMap<u64, u64, DefaultHashBuilder>,
}

impl FilterCache {
    pub fn new() -> Self {
        FilterCache {
            core: LruCore::new(),
            n: 2,
            seen: HashMap::default(),
        }
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for FilterCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn set_par(&mut self, name: &str, value: &str) {
        match name {
            "n" => match value.parse::<u64>() {
                Ok(n) if n > 0 => self.n = n,
                _ => tracing::warn!(value, "invalid value for parameter n"),
            },
            _ => tracing::warn!(parameter = name, "unrecognized parameter"),
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        *self.seen.entry(req.id).or_insert(0) += 1;
        self.core.touch(req.id)
    }

    fn admit(&mut self, req: &Request) {
        if self.seen.get(&req.id).copied().unwrap_or(0) <= self.n {
            return;
        }
        self.core.admit(req);
    }
}

/// LRU admission gated on object size: admit iff `size < 2^t` bytes.
#[derive(Debug)]
pub struct ThLruCache {
    core: LruCore,
    size_threshold: f64,
}

impl ThLruCache {
    pub fn new() -> Self {
        ThLruCache {
            core: LruCore::new(),
            size_threshold: 524_288.0, // 2^19
        }
    }
}

impl Default for ThLruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for ThLruCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn set_par(&mut self, name: &str, value: &str) {
        match name {
            "t" => match value.parse::<f64>() {
                Ok(t) if t >= 0.0 => self.size_threshold = 2f64.powf(t),
                _ => tracing::warn!(value, "invalid value for parameter t"),
            },
            _ => tracing::warn!(parameter = name, "unrecognized parameter"),
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.core.touch(req.id)
    }

    fn admit(&mut self, req: &Request) {
        if (req.size as f64) < self.size_threshold {
            self.core.admit(req);
        }
    }
}

/// LRU with size-aware probabilistic admission: a missed object is admitted
/// with probability exponentially decreasing in its size,
/// `exp(-size / 2^c)`.
#[derive(Debug)]
pub struct ExpLruCache {
    core: LruCore,
    c: f64,
    rng: StdRng,
}

impl ExpLruCache {
    pub fn new() -> Self {
        ExpLruCache {
            core: LruCore::new(),
            c: 262_144.0, // 2^18
            rng: StdRng::seed_from_u64(DEFAULT_ADMISSION_SEED),
        }
    }
}

impl Default for ExpLruCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for ExpLruCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn set_par(&mut self, name: &str, value: &str) {
        match name {
            "c" => match value.parse::<f64>() {
                Ok(c) if c > 0.0 => self.c = 2f64.powf(c),
                _ => tracing::warn!(value, "invalid value for parameter c"),
            },
            "seed" => match value.parse::<u64>() {
                Ok(seed) => self.rng = StdRng::seed_from_u64(seed),
                Err(_) => tracing::warn!(value, "invalid value for parameter seed"),
            },
            _ => tracing::warn!(parameter = name, "unrecognized parameter"),
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.core.touch(req.id)
    }

    fn admit(&mut self, req: &Request) {
        let admission_prob = (-(req.size as f64) / self.c).exp();
        if self.rng.gen_bool(admission_prob) {
            self.core.admit(req);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, size: u64) -> Request {
        Request::new(id, size)
    }

    fn drive(cache: &mut dyn Cache, trace: &[(u64, u64)]) -> u64 {
        let mut hits = 0;
        for &(id, size) in trace {
            let r = req(id, size);
            if cache.lookup(&r) {
                hits += 1;
            } else {
                cache.admit(&r);
            }
        }
        hits
    }

    #[test]
    fn test_filter_admits_after_n_sightings() {
        let mut cache = FilterCache::new();
        cache.set_size(10);

        // n = 2: the third sighting is the first one past the filter, so the
        // third lookup of each id is the only hit
        let trace = [(1, 1), (1, 1), (1, 1), (2, 1), (2, 1), (2, 1)];
        assert_eq!(drive(&mut cache, &trace), 2);
    }

    #[test]
    fn test_filter_parameter() {
        let mut cache = FilterCache::new();
        cache.set_size(10);
        cache.set_par("n", "1");

        // With n = 1 the second sighting admits, so the second lookup misses
        // but the third hits
        let trace = [(1, 1), (1, 1), (1, 1)];
        assert_eq!(drive(&mut cache, &trace), 1);
    }

    #[test]
    fn test_thlru_threshold() {
        let mut cache = ThLruCache::new();
        cache.set_size(10);
        cache.set_par("t", "1"); // threshold 2 bytes

        // Size 1 passes (1 < 2), size 2 does not (2 < 2 fails)
        let trace = [(1, 1), (1, 1), (2, 2), (2, 2)];
        assert_eq!(drive(&mut cache, &trace), 1);
    }

    #[test]
    fn test_thlru_threshold_boundary() {
        let mut cache = ThLruCache::new();
        cache.set_size(10);
        cache.set_par("t", "0"); // threshold 1 byte: size < 1 never holds

        let trace = [(1, 1), (1, 1)];
        assert_eq!(drive(&mut cache, &trace), 0);
    }

    #[test]
    fn test_explru_large_constant_admits_small_objects() {
        let mut cache = ExpLruCache::new();
        cache.set_size(100);
        cache.set_par("c", "30"); // admission probability exp(-1/2^30) ~ 1

        let trace = [(1, 1), (1, 1), (2, 1), (2, 1)];
        assert_eq!(drive(&mut cache, &trace), 2);
    }

    #[test]
    fn test_explru_seeded_runs_are_reproducible() {
        let trace: Vec<(u64, u64)> = (0..200).map(|i| (i % 40, 1 + i % 7)).collect();

        let run = |seed: &str| {
            let mut cache = ExpLruCache::new();
            cache.set_size(50);
            cache.set_par("c", "2");
            cache.set_par("seed", seed);
            drive(&mut cache, &trace)
        };

        assert_eq!(run("7"), run("7"));
    }
}
