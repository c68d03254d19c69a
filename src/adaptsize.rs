//! AdaptSize: size-aware probabilistic admission with a self-tuning constant.
//!
//! Admission works like `ExpLRU` — a missed object of size `s` enters with
//! probability `exp(-s / c)` — but `c` is re-optimised every
//! `reconfiguration_interval` requests from observed per-object request
//! rates:
//!
//! 1. Request statistics accumulate per object in an interval map and are
//!    folded into a long-term map with EWMA smoothing at each
//!    reconfiguration.
//! 2. Entries whose smoothed request count decays below 0.1 are dropped;
//!    survivors are packed into dense parallel arrays for the model.
//! 3. A Che-style hit-rate model predicts the object hit ratio a candidate
//!    `c = 2^x` would achieve, via a fixed-point iteration on the cache's
//!    characteristic time.
//! 4. `x` is maximised over `[0, log2(capacity)]` with a coarse grid scan
//!    followed by a golden-section search.
//!
//! A reconfiguration with too little data (`statSize <= 3 * capacity`) is
//! deferred by 10 000 requests. If the model ever yields NaN, the search
//! stops and the previous constant is kept.

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;
use hashbrown::{DefaultHashBuilder, HashMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::admission::DEFAULT_ADMISSION_SEED;

/// EWMA smoothing factor applied to long-term request counts.
const EWMA_DECAY: f64 = 0.3;

/// Golden ratio `(sqrt(5) - 1) / 2` and its complement, the bracket shrink
/// factors from the Numerical Recipes golden-section routine.
const GSS_R: f64 = 0.618_033_99;
const GSS_V: f64 = 1.0 - GSS_R;

/// Relative bracket-width termination tolerance.
const TOL: f64 = 3.0e-8;

/// Extra requests granted when a reconfiguration fires with too little data.
const DEFER_REQUESTS: u64 = 10_000;

/// Per-object request statistics.
#[derive(Debug, Clone, Copy, Default)]
struct ObjInfo {
    /// EWMA-smoothed (long-term) or raw (interval) request count.
    request_count: f64,
    /// Most recently observed object size.
    obj_size: u64,
}

/// ExpLRU whose admission constant is periodically re-tuned by a hit-rate
/// model and golden-section search.
#[derive(Debug)]
pub struct AdaptSizeCache {
    core: LruCore,
    /// Admission constant `c` in `exp(-size / c)`.
    c_param: f64,
    /// Sum of object sizes represented in either metadata map.
    stat_size: u64,
    max_iterations: u64,
    reconfiguration_interval: u64,
    /// Requests remaining until the next reconfiguration attempt.
    next_reconfiguration: u64,
    /// Statistics for the current interval.
    interval_meta: HashMap<u64, ObjInfo, DefaultHashBuilder>,
    /// EWMA-smoothed statistics across intervals.
    long_term_meta: HashMap<u64, ObjInfo, DefaultHashBuilder>,
    // Dense copies of the surviving long-term stats, rebuilt at each
    // reconfiguration for the model evaluation loops.
    aligned_req_count: Vec<f64>,
    aligned_obj_size: Vec<f64>,
    aligned_adm_prob: Vec<f64>,
    rng: StdRng,
}

impl AdaptSizeCache {
    pub fn new() -> Self {
        AdaptSizeCache {
            core: LruCore::new(),
            c_param: (1u64 << 15) as f64,
            stat_size: 0,
            max_iterations: 15,
            reconfiguration_interval: 500_000,
            next_reconfiguration: 500_000,
            interval_meta: HashMap::default(),
            long_term_meta: HashMap::default(),
            aligned_req_count: Vec::new(),
            aligned_obj_size: Vec::new(),
            aligned_adm_prob: Vec::new(),
            rng: StdRng::seed_from_u64(DEFAULT_ADMISSION_SEED),
        }
    }

    /// Counts down to the next reconfiguration and runs it when due.
    fn reconfigure(&mut self) {
        self.next_reconfiguration -= 1;
        if self.next_reconfiguration > 0 {
            return;
        }
        if self.stat_size <= self.core.capacity().saturating_mul(3) {
            // not enough data has been gathered
            self.next_reconfiguration += DEFER_REQUESTS;
            return;
        }
        self.next_reconfiguration = self.reconfiguration_interval;

        // Smooth the long-term stats, then fold the interval stats in
        for info in self.long_term_meta.values_mut() {
            info.request_count *= EWMA_DECAY;
        }
        for (id, info) in self.interval_meta.drain() {
            match self.long_term_meta.get_mut(&id) {
                Some(long_term) => {
                    long_term.request_count += (1.0 - EWMA_DECAY) * info.request_count;
                    long_term.obj_size = info.obj_size;
                }
                None => {
                    self.long_term_meta.insert(id, info);
                }
            }
        }

        // Pack the survivors into dense arrays and drop decayed entries
        self.aligned_req_count.clear();
        self.aligned_obj_size.clear();
        let mut total_req_count = 0.0;
        let mut total_obj_size = 0u64;
        let aligned_req_count = &mut self.aligned_req_count;
        let aligned_obj_size = &mut self.aligned_obj_size;
        let stat_size = &mut self.stat_size;
        self.long_term_meta.retain(|_, info| {
            if info.request_count < 0.1 {
                // saturating: a size change after the first sighting can
                // leave the dropped entry larger than what was accounted
                *stat_size = stat_size.saturating_sub(info.obj_size);
                false
            } else {
                aligned_req_count.push(info.request_count);
                total_req_count += info.request_count;
                aligned_obj_size.push(info.obj_size as f64);
                total_obj_size += info.obj_size;
                true
            }
        });

        tracing::debug!(
            objects = self.long_term_meta.len(),
            total_req_count,
            log2_total_size = (total_obj_size as f64).log2(),
            log2_stat_size = (self.stat_size as f64).log2(),
            "reconfiguring admission constant"
        );

        // Maximise the modelled hit rate over c = 2^x, x in [0, log2(capacity)].
        // x1 and x2 bracket the current estimate of the optimum:
        // |x0 -- x1 -- x2 -- x3|
        let mut x0 = 0.0;
        let mut x1 = (self.core.capacity() as f64).log2();
        let mut x2;
        let mut x3 = x1;

        // Coarse grid scan seeds the bracket
        let mut best_hit_rate = 0.0;
        let mut grid_x = 2.0;
        while grid_x < x3 {
            let hit_rate = self.model_hit_rate(grid_x);
            if hit_rate > best_hit_rate {
                best_hit_rate = hit_rate;
                x1 = grid_x;
            }
            grid_x += 4.0;
        }

        // Bisect the larger segment around the grid winner at the
        // golden-ratio point
        let mut h1 = best_hit_rate;
        let mut h2;
        if x3 - x1 > x1 - x0 {
            x2 = x1 + GSS_V * (x3 - x1);
            h2 = self.model_hit_rate(x2);
        } else {
            x2 = x1;
            h2 = h1;
            x1 = x0 + GSS_V * (x1 - x0);
            h1 = self.model_hit_rate(x1);
        }

        // Golden-section iterations, termination per [Numerical Recipes in C]
        let mut iterations = 0;
        while iterations < self.max_iterations && (x3 - x0).abs() > TOL * (x1.abs() + x2.abs()) {
            iterations += 1;
            if h1.is_nan() || h2.is_nan() {
                break;
            }
            if h2 > h1 {
                x0 = x1;
                x1 = x2;
                x2 = GSS_R * x1 + GSS_V * x3;
                h1 = h2;
                h2 = self.model_hit_rate(x2);
            } else {
                x3 = x2;
                x2 = x1;
                x1 = GSS_R * x2 + GSS_V * x0;
                h2 = h1;
                h1 = self.model_hit_rate(x1);
            }
        }

        if h1.is_nan() || h2.is_nan() {
            tracing::error!(h1, h2, "numerical failure in hit-rate model, keeping previous admission constant");
        } else if h1 > h2 {
            self.c_param = 2f64.powf(x1);
            tracing::debug!(c = self.c_param, log2_c = x1, "admission constant chosen");
        } else {
            self.c_param = 2f64.powf(x2);
            tracing::debug!(c = self.c_param, log2_c = x2, "admission constant chosen");
        }
    }

    /// Predicted object hit ratio (request-weighted, unnormalised) for the
    /// admission constant `c = 2^log2c`, over the packed long-term stats.
    fn model_hit_rate(&mut self, log2c: f64) -> f64 {
        let pow2c = 2f64.powf(log2c);
        let capacity = self.core.capacity() as f64;

        let mut sum_val = 0.0;
        for i in 0..self.aligned_req_count.len() {
            sum_val += self.aligned_req_count[i]
                * (-self.aligned_obj_size[i] / pow2c).exp()
                * self.aligned_obj_size[i];
        }
        if sum_val <= 0.0 {
            return 0.0;
        }
        let mut the_t = capacity / sum_val;

        self.aligned_adm_prob.clear();
        for size in &self.aligned_obj_size {
            self.aligned_adm_prob.push((-size / pow2c).exp());
        }

        // Fixed-point iteration on the characteristic time
        for _ in 0..10 {
            if the_t > 1e70 {
                break;
            }
            let mut the_c = 0.0;
            for i in 0..self.aligned_req_count.len() {
                let req_t_prod = self.aligned_req_count[i] * the_t;
                if req_t_prod > 150.0 {
                    // hit probability is 1, but numerically inaccurate to calculate
                    the_c += self.aligned_obj_size[i];
                } else {
                    let exp_term = req_t_prod.exp() - 1.0;
                    let exp_adm_prod = self.aligned_adm_prob[i] * exp_term;
                    the_c += self.aligned_obj_size[i] * (exp_adm_prod / (1.0 + exp_adm_prod));
                }
            }
            the_t = capacity * the_t / the_c;
        }

        let mut weighted_hit_ratio_sum = 0.0;
        for i in 0..self.aligned_req_count.len() {
            let p1 = o_p1(the_t, self.aligned_req_count[i], self.aligned_adm_prob[i]);
            let p2 = o_p2(the_t, self.aligned_req_count[i], self.aligned_adm_prob[i]);
            let ratio = if p1 != 0.0 && p2 == 0.0 {
                0.0
            } else {
                (p1 / p2).clamp(0.0, 1.0)
            };
            weighted_hit_ratio_sum += self.aligned_req_count[i] * ratio;
        }
        weighted_hit_ratio_sum
    }

    #[cfg(test)]
    fn admission_constant(&self) -> f64 {
        self.c_param
    }
}

/// Numerator polynomial of the per-object hit-ratio model.
fn o_p1(t: f64, l: f64, p: f64) -> f64 {
    l * p * t * (840.0 + 60.0 * l * t + 20.0 * l * l * t * t + l * l * l * t * t * t)
}

/// Denominator polynomial of the per-object hit-ratio model.
fn o_p2(t: f64, l: f64, p: f64) -> f64 {
    840.0 + 120.0 * l * (-3.0 + 7.0 * p) * t
        + 60.0 * l * l * (1.0 + p) * t * t
        + 4.0 * l * l * l * (-1.0 + 5.0 * p) * t * t * t
        + l * l * l * l * p * t * t * t * t
}

impl Default for AdaptSizeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for AdaptSizeCache {
    fn set_size(&mut self, bytes: u64) {
        self.core.set_capacity(bytes);
    }

    fn set_par(&mut self, name: &str, value: &str) {
        match name {
            "t" => match value.parse::<u64>() {
                Ok(t) if t > 1 => {
                    self.reconfiguration_interval = t;
                    self.next_reconfiguration = t;
                }
                _ => tracing::warn!(value, "invalid value for parameter t"),
            },
            "i" => match value.parse::<u64>() {
                Ok(i) if i > 1 => self.max_iterations = i,
                _ => tracing::warn!(value, "invalid value for parameter i"),
            },
            "seed" => match value.parse::<u64>() {
                Ok(seed) => self.rng = StdRng::seed_from_u64(seed),
                Err(_) => tracing::warn!(value, "invalid value for parameter seed"),
            },
            _ => tracing::warn!(parameter = name, "unrecognized parameter"),
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.reconfigure();

        if !self.interval_meta.contains_key(&req.id) && !self.long_term_meta.contains_key(&req.id)
        {
            // new object; a size change counts as a new object too, so the
            // old entry's size is never corrected here
            self.stat_size += req.size;
        }
        let info = self.interval_meta.entry(req.id).or_default();
        info.request_count += 1.0;
        info.obj_size = req.size;

        self.core.touch(req.id)
    }

    fn admit(&mut self, req: &Request) {
        let roll: f64 = self.rng.gen();
        let admit_prob = (-(req.size as f64) / self.c_param).exp();
        if roll < admit_prob {
            self.core.admit(req);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(cache: &mut AdaptSizeCache, trace: &[(u64, u64)]) {
        for &(id, size) in trace {
            let r = Request::new(id, size);
            if !cache.lookup(&r) {
                cache.admit(&r);
            }
        }
    }

    #[test]
    fn test_reconfiguration_deferred_without_data() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(1_000_000);
        cache.set_par("t", "10");

        // statSize stays far below 3x capacity, so the countdown keeps being
        // pushed out and the constant never moves
        let trace: Vec<(u64, u64)> = (0..100).map(|i| (i % 5, 10)).collect();
        drive(&mut cache, &trace);
        assert_eq!(cache.admission_constant(), (1u64 << 15) as f64);
    }

    #[test]
    fn test_reconfiguration_picks_constant_in_range() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(1000);
        cache.set_par("t", "50");
        cache.set_par("seed", "42");

        // 40 distinct objects of 100 bytes: statSize 4000 > 3 * 1000, so the
        // first reconfiguration actually optimises
        let trace: Vec<(u64, u64)> = (0..400).map(|i| (i % 40, 100)).collect();
        drive(&mut cache, &trace);

        let c = cache.admission_constant();
        assert!(c.is_finite());
        assert!((1.0..=1000.0).contains(&c), "c = 2^x with x in [0, log2(capacity)], got {c}");
    }

    #[test]
    fn test_model_hit_rate_empty_stats() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(1000);
        assert_eq!(cache.model_hit_rate(5.0), 0.0);
    }

    #[test]
    fn test_model_hit_rate_bounded_by_request_weight() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(10_000);
        cache.aligned_req_count = vec![5.0, 2.0, 0.5];
        cache.aligned_obj_size = vec![100.0, 2000.0, 50.0];

        let total: f64 = cache.aligned_req_count.iter().sum();
        for x in [0.0, 2.0, 6.0, 10.0, 13.0] {
            let rate = cache.model_hit_rate(x);
            assert!(rate.is_finite());
            assert!((0.0..=total).contains(&rate), "per-object ratios are clamped to [0,1]");
        }
    }

    #[test]
    fn test_grid_scan_never_loses_to_its_own_points() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(10_000);
        cache.aligned_req_count = vec![8.0, 4.0, 2.0, 1.0];
        cache.aligned_obj_size = vec![64.0, 512.0, 4096.0, 9000.0];

        let x_max = (10_000f64).log2();
        let mut best = 0.0f64;
        let mut x = 2.0;
        while x < x_max {
            let rate = cache.model_hit_rate(x);
            assert!(rate.is_finite() && rate >= 0.0);
            best = best.max(rate);
            x += 4.0;
        }
        // The bracket seed dominates every grid evaluation, including the
        // low end of the search range
        assert!(best >= cache.model_hit_rate(2.0));
    }

    #[test]
    fn test_stat_size_tracks_new_objects_once() {
        let mut cache = AdaptSizeCache::new();
        cache.set_size(1_000_000);
        let r = Request::new(1, 100);
        cache.lookup(&r);
        cache.lookup(&r);
        assert_eq!(cache.stat_size, 100);
    }
}
