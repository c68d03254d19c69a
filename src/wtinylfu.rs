//! W-TinyLFU: a small LRU window in front of an SLRU main cache.
//!
//! ```text
//!              ┌────────────┐ displaced tails ┌──────────────────────────┐
//! admit ─────▶ │   window   │ ───────────────▶│   main (SLRU + sketch)   │
//!              │   (LRU)    │                 │  probation | protected   │
//!              └────────────┘                 └──────────────────────────┘
//!                    ▲                                     ▲
//!                    └──────── doorkeeper gates every admission
//! ```
//!
//! The window absorbs short-term bursts; objects it displaces compete for the
//! main cache through the sketch-gated [`SlruCache::admit_from_window`]. The
//! doorkeeper filters one-hit wonders: a first-time miss only sets the
//! doorkeeper bit, so an object reaches the cache on its second sighting.
//!
//! The window share `w` (percent of the byte budget, default 1) partitions
//! the capacity as `main = floor((1 - w/100) * C)`, window the remainder.
//! An optional hill climber re-partitions at a fixed request cadence: when
//! the running hit ratio improved since the last check the window grows along
//! the ladder `0 → 1 → 5 → 10 → … → 80`, when it degraded the window shrinks
//! back down, rebalancing resident objects either way.

use crate::lru::LruCore;
use crate::policy::Cache;
use crate::request::Request;
use crate::slru::SlruCache;

/// Probation / protected indices in the main cache.
const PROBATION: usize = 0;
const PROTECTED: usize = 1;

/// Largest window share the hill climber will reach.
const MAX_WINDOW_PERCENT: u64 = 80;

/// Window LRU + SLRU main with doorkeeper-gated admission.
#[derive(Debug)]
pub struct WTinyLfuCache {
    main: SlruCache,
    window: LruCore,
    capacity: u64,
    /// Window share of the byte budget, in percent (0..=80).
    window_percent: u64,
    reqs: u64,
    hits: u64,
    prev_hit_ratio: f64,
    hill_climb: bool,
    /// Hill-climber cadence in requests; defaults to the byte capacity
    /// taken as a request count when unset.
    climb_interval: Option<u64>,
}

impl WTinyLfuCache {
    pub fn new() -> Self {
        WTinyLfuCache {
            main: SlruCache::new(),
            window: LruCore::new(),
            capacity: 0,
            window_percent: 1,
            reqs: 0,
            hits: 0,
            prev_hit_ratio: 0.0,
            hill_climb: false,
            climb_interval: None,
        }
    }

    /// Sum of resident object sizes in the window and the main cache.
    pub fn current_bytes(&self) -> u64 {
        self.window.current_bytes() + self.main.current_bytes()
    }

    /// Main-cache share of the budget for the current window percent.
    fn main_share(&self, window_percent: u64) -> u64 {
        (self.capacity as f64 * (1.0 - window_percent as f64 / 100.0)).floor() as u64
    }

    /// Applies the current partition to both members. The window gets the
    /// remainder so the shares always sum to the full budget.
    fn apply_partition(&mut self) {
        let main = self.main_share(self.window_percent);
        self.main.set_size(main);
        self.window.set_capacity(self.capacity - main);
        tracing::debug!(main, window = self.capacity - main, percent = self.window_percent, "budget partitioned");
    }

    fn next_step_up(window_percent: u64) -> u64 {
        match window_percent {
            0 => 1,
            1 => 5,
            p => (p + 5).min(MAX_WINDOW_PERCENT),
        }
    }

    fn next_step_down(window_percent: u64) -> u64 {
        match window_percent {
            0 | 1 => 0,
            5 => 1,
            p => p - 5,
        }
    }

    /// Compares the running hit ratio against the previous check and steps
    /// the window share along the ladder, rebalancing resident objects.
    fn hill_climber(&mut self) {
        let interval = self.climb_interval.unwrap_or(self.capacity).max(1);
        if self.reqs % interval != 0 {
            return;
        }
        let hit_ratio = self.hits as f64 / self.reqs as f64;

        if hit_ratio > self.prev_hit_ratio {
            self.window_percent = Self::next_step_up(self.window_percent);
            self.prev_hit_ratio = hit_ratio;
            self.window
                .set_capacity(self.capacity - self.main_share(self.window_percent));
            self.increase_window();
        } else if hit_ratio < self.prev_hit_ratio {
            self.window_percent = Self::next_step_down(self.window_percent);
            self.prev_hit_ratio = hit_ratio;
            self.main.set_size(self.main_share(self.window_percent));
            self.increase_main_cache();
        }
    }

    /// Drains the main cache down to its shrunken share, moving evictees
    /// into the grown window. Probation empties first.
    fn increase_window(&mut self) {
        let main_share = self.main_share(self.window_percent);
        while self.main.current_bytes() > main_share {
            let victim = if self.main.segment_current(PROBATION) == 0 {
                self.main.evict_return(PROTECTED)
            } else {
                self.main.evict_return(PROBATION)
            };
            match victim {
                Some(victim) => self.window.admit(&victim),
                None => break,
            }
        }
        self.main.set_size(main_share);
    }

    /// Drains the window down to its shrunken share, moving evictees into
    /// the grown main cache: protected when it has room, probation otherwise.
    fn increase_main_cache(&mut self) {
        let window_share = self.capacity - self.main_share(self.window_percent);
        while self.window.current_bytes() > window_share {
            match self.window.evict_lru() {
                Some(victim) => {
                    if self.main.segment_fits(PROTECTED, victim.size) {
                        self.main.segment_admit(PROTECTED, &victim);
                    } else {
                        self.main.segment_admit(PROBATION, &victim);
                    }
                }
                None => break,
            }
        }
        self.window.set_capacity(window_share);
    }
}

impl Default for WTinyLfuCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for WTinyLfuCache {
    fn set_size(&mut self, bytes: u64) {
        self.capacity = bytes;
        self.apply_partition();
    }

    fn set_par(&mut self, name: &str, value: &str) {
        match name {
            "window" => match value.parse::<u64>() {
                Ok(p) if p <= 100 => {
                    self.window_percent = p;
                    self.apply_partition();
                }
                _ => tracing::warn!(value, "invalid value for parameter window"),
            },
            "hill_climb" => match value {
                "1" | "true" => self.hill_climb = true,
                "0" | "false" => self.hill_climb = false,
                _ => tracing::warn!(value, "invalid value for parameter hill_climb"),
            },
            "climb_interval" => match value.parse::<u64>() {
                Ok(n) if n > 0 => self.climb_interval = Some(n),
                _ => tracing::warn!(value, "invalid value for parameter climb_interval"),
            },
            _ => tracing::warn!(parameter = name, "unrecognized parameter"),
        }
    }

    fn lookup(&mut self, req: &Request) -> bool {
        self.reqs += 1;

        if self.main.doorkeeper_contains(req.id) {
            self.main.update_cm(req.id);
        }
        let hit = self.window.touch(req.id) || self.main.lookup(req);
        if hit {
            self.main.update_doorkeeper(req.id);
            self.hits += 1;
        }
        if self.hill_climb {
            self.hill_climber();
        }
        hit
    }

    fn admit(&mut self, req: &Request) {
        // First sighting only sets the doorkeeper; the object enters the
        // cache when it comes back
        if !self.main.doorkeeper_contains(req.id) {
            self.main.update_doorkeeper(req.id);
            return;
        }
        if self.window.capacity() == 0 {
            self.main.admit_from_window(req);
            return;
        }
        let displaced = self.window.admit_with_return(req);
        for victim in displaced {
            self.main.admit_from_window(&victim);
        }
    }
}
