//! Match-scoped randomness.
//!
//! One `MatchRng` is owned per match (crit rolls, power-up placement,
//! spawn jitter). Backed by `rand`'s `StdRng` rather than a hand-rolled
//! PRNG — see `DESIGN.md` for why the teacher's deterministic Xorshift
//! wrapper was not carried over.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A per-match random number source.
pub struct MatchRng {
    inner: StdRng,
}

impl MatchRng {
    /// Seed a new generator from OS entropy.
    pub fn new() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }

    /// Seed a new generator from an explicit seed (useful in tests).
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Sample a uniform `f64` in `[0, 1)`, e.g. for crit rolls.
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Access the underlying RNG for APIs that want `impl Rng`.
    pub fn rng(&mut self) -> &mut impl Rng {
        &mut self.inner
    }
}

impl Default for MatchRng {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_unit_range() {
        let mut rng = MatchRng::from_seed(7);
        for _ in 0..1000 {
            let v = rng.uniform();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
