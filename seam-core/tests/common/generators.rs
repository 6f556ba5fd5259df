//! Stochastic generators for chunking and text variations
//!
//! Uses seeded RNG for reproducibility. Print seed on failure for replay.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded generator for reproducible stochastic tests
pub struct Gen {
    pub rng: StdRng,
    pub seed: u64,
}

impl Gen {
    /// Create with specific seed (for reproduction)
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create from environment or random seed
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var("SEAM_TEST_SEED")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| rand::random());
        Self::new(seed)
    }

    /// Random boolean with probability p
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// Random text over a small alphabet, biased toward match-adjacent
    /// content so the battery patterns actually fire.
    pub fn text(&mut self, max_len: usize) -> String {
        let alphabet = ['a', 'b', 'c', ' '];
        let len = self.rng.gen_range(0..=max_len);
        (0..len)
            .map(|_| alphabet[self.rng.gen_range(0..alphabet.len())])
            .collect()
    }

    /// Random ascending cut offsets within `0..=len` (char units).
    pub fn cuts(&mut self, len: usize) -> Vec<usize> {
        if len == 0 {
            return Vec::new();
        }
        let mut cuts: Vec<usize> = (1..len).filter(|_| self.chance(0.3)).collect();
        cuts.dedup();
        cuts
    }
}
