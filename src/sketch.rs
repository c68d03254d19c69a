//! Frequency sketches used by the TinyLFU family.
//!
//! Two structures share the same row layout and hash family:
//!
//! - [`CountMinSketch`]: approximate frequency counter. An update adds the
//!   increment to one cell per row; a point estimate is the row-wise minimum,
//!   which never under-counts (`estimate(id) >= true_count(id)`, with
//!   over-counting bounded in expectation by `total / width`).
//! - [`Doorkeeper`]: a binary Count-Min. Cells saturate at 1, membership is
//!   the row-wise minimum, and the whole structure can be reset. It filters
//!   one-hit wonders before they reach the main sketch.
//!
//! Each row hashes with a pairwise-independent
//! `h(x) = ((a * x + b) mod p) mod width` where `p = 2^31 - 1` and `(a, b)`
//! are drawn from a seeded PRNG, so two sketches built with the same seed and
//! geometry agree cell-for-cell.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Modulus for the pairwise hash family, the Mersenne prime `2^31 - 1`.
const MERSENNE_PRIME: u64 = (1 << 31) - 1;

/// Seed used for sketch hash parameters, carried over from the original
/// simulator so traces replay identically across runs.
pub(crate) const DEFAULT_SKETCH_SEED: u64 = 1_033_096_058;

/// Returns the smallest prime `>= n`, with a floor of 2.
fn next_prime(n: usize) -> usize {
    fn is_prime(n: usize) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2usize;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

/// One row's pairwise-independent hash, parameterised by `(a, b)`.
#[derive(Debug, Clone, Copy)]
struct PairwiseHash {
    a: u64,
    b: u64,
}

impl PairwiseHash {
    fn from_rng(rng: &mut StdRng) -> Self {
        PairwiseHash {
            a: rng.gen_range(1..MERSENNE_PRIME),
            b: rng.gen_range(0..MERSENNE_PRIME),
        }
    }

    fn bucket(&self, x: u64, width: usize) -> usize {
        // a * x needs 128-bit room: a < 2^31 but x spans the full id space
        let v = ((u128::from(self.a) * u128::from(x) + u128::from(self.b))
            % u128::from(MERSENNE_PRIME)) as u64;
        (v % width as u64) as usize
    }
}

/// Count-Min sketch over 64-bit object ids.
#[derive(Debug)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,
    /// Row-major `depth * width` counter matrix.
    cells: Vec<u64>,
    hashes: Vec<PairwiseHash>,
}

impl CountMinSketch {
    /// Creates a sketch with `depth` rows of the smallest prime width
    /// `>= target_width`. Hash parameters are drawn from a PRNG seeded with
    /// `seed`.
    pub fn new(target_width: usize, depth: usize, seed: u64) -> Self {
        let width = next_prime(target_width);
        let depth = depth.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let hashes = (0..depth).map(|_| PairwiseHash::from_rng(&mut rng)).collect();
        CountMinSketch {
            width,
            depth,
            cells: vec![0; width * depth],
            hashes,
        }
    }

    /// Adds `delta` to the object's cell in every row and returns the fresh
    /// point estimate.
    pub fn update(&mut self, id: u64, delta: u64) -> u64 {
        let mut estimate = u64::MAX;
        for row in 0..self.depth {
            let idx = row * self.width + self.hashes[row].bucket(id, self.width);
            self.cells[idx] += delta;
            estimate = estimate.min(self.cells[idx]);
        }
        estimate
    }

    /// Returns the row-wise minimum count for the object.
    pub fn estimate(&self, id: u64) -> u64 {
        let mut estimate = u64::MAX;
        for row in 0..self.depth {
            let idx = row * self.width + self.hashes[row].bucket(id, self.width);
            estimate = estimate.min(self.cells[idx]);
        }
        if estimate == u64::MAX {
            0
        } else {
            estimate
        }
    }

    /// Width actually allocated (prime-rounded).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Binary Count-Min used as a membership hint.
#[derive(Debug)]
pub struct Doorkeeper {
    width: usize,
    depth: usize,
    cells: Vec<u8>,
    hashes: Vec<PairwiseHash>,
}

impl Doorkeeper {
    /// Creates a doorkeeper with the same geometry rules as
    /// [`CountMinSketch::new`].
    pub fn new(target_width: usize, depth: usize, seed: u64) -> Self {
        let width = next_prime(target_width);
        let depth = depth.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let hashes = (0..depth).map(|_| PairwiseHash::from_rng(&mut rng)).collect();
        Doorkeeper {
            width,
            depth,
            cells: vec![0; width * depth],
            hashes,
        }
    }

    /// Marks the object. Idempotent: cells saturate at 1.
    pub fn update(&mut self, id: u64) {
        for row in 0..self.depth {
            let idx = row * self.width + self.hashes[row].bucket(id, self.width);
            self.cells[idx] = 1;
        }
    }

    /// Returns true if every row's cell for the object is set.
    pub fn contains(&self, id: u64) -> bool {
        self.estimate(id) == 1
    }

    /// Row-wise minimum, in `{0, 1}`.
    pub fn estimate(&self, id: u64) -> u64 {
        for row in 0..self.depth {
            let idx = row * self.width + self.hashes[row].bucket(id, self.width);
            if self.cells[idx] == 0 {
                return 0;
            }
        }
        1
    }

    /// Clears every cell.
    pub fn reset(&mut self) {
        self.cells.fill(0);
    }
}
