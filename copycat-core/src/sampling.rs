//! # Sampling - Weighted Random Choice
//!
//! Every probabilistic decision in a trial goes through here: picking the
//! next codelet, picking which object a scout looks at, deciding whether a
//! structure wins a fight. The free functions take any `rand::Rng` so they
//! can be tested in isolation; `Randomness` bundles them over a seeded
//! `StdRng` owned by one trial.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Pick an index with probability proportional to its weight.
///
/// Returns `None` for an empty slice. When every weight is zero (or the
/// weights are not finite) the choice is uniform.
pub fn weighted_index<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    if total <= 0.0 || !total.is_finite() {
        return Some(rng.gen_range(0..weights.len()));
    }

    let mut r = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        r -= w.max(0.0);
        if r < 0.0 {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

/// Pick an item with probability proportional to its weight
pub fn weighted_choice<'a, T, R: Rng + ?Sized>(
    rng: &mut R,
    items: &'a [T],
    weights: &[f64],
) -> Option<&'a T> {
    debug_assert_eq!(items.len(), weights.len());
    weighted_index(rng, weights).and_then(|i| items.get(i))
}

/// Mix an overall seed with a trial index (splitmix64)
pub fn trial_seed(seed: u64, trial: u64) -> u64 {
    let mut z = seed ^ trial.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-trial source of randomness
#[derive(Clone, Debug)]
pub struct Randomness {
    rng: StdRng,
}

impl Randomness {
    /// Deterministic stream for a seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream for trial `trial` of a run seeded with `seed`
    pub fn for_trial(seed: u64, trial: u64) -> Self {
        Self::seeded(trial_seed(seed, trial))
    }

    /// Uniform value in [0, 1)
    pub fn uniform(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// True with probability `p`
    pub fn coin_flip(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Fair coin
    pub fn flip(&mut self) -> bool {
        self.coin_flip(0.5)
    }

    /// Uniform choice from a slice
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.rng.gen_range(0..items.len()))
    }

    /// Index with probability proportional to weight
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        weighted_index(&mut self.rng, weights)
    }

    /// Item with probability proportional to weight
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Option<&'a T> {
        weighted_choice(&mut self.rng, items, weights)
    }

    /// True with probability `first / (first + second)`
    pub fn weighted_greater_than(&mut self, first: f64, second: f64) -> bool {
        let total = first + second;
        if total <= 0.0 {
            return false;
        }
        self.coin_flip(first / total)
    }

    /// `value` plus or minus its square root, with equal odds
    pub fn sqrt_blur(&mut self, value: f64) -> f64 {
        let root = value.sqrt();
        if self.flip() {
            value + root
        } else {
            value - root
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_index_respects_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let i = weighted_index(&mut rng, &[0.0, 3.0, 0.0]).unwrap();
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn test_weighted_index_all_zero_is_uniform() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            seen[weighted_index(&mut rng, &[0.0, 0.0, 0.0]).unwrap()] += 1;
        }
        assert!(seen.iter().all(|&n| n > 50), "uniform fallback skewed: {:?}", seen);
    }

    #[test]
    fn test_weighted_index_proportions() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut heavy = 0;
        for _ in 0..10_000 {
            if weighted_index(&mut rng, &[1.0, 9.0]).unwrap() == 1 {
                heavy += 1;
            }
        }
        assert!((8_600..9_400).contains(&heavy), "got {}", heavy);
    }

    #[test]
    fn test_empty_choices() {
        let mut r = Randomness::seeded(1);
        let empty: [u8; 0] = [];
        assert!(r.choice(&empty).is_none());
        assert!(r.weighted_choice(&empty, &[]).is_none());
        assert!(!r.weighted_greater_than(0.0, 0.0));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = Randomness::for_trial(99, 4);
        let mut b = Randomness::for_trial(99, 4);
        for _ in 0..32 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
        assert_ne!(trial_seed(99, 4), trial_seed(99, 5));
    }
}
