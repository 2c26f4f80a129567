//! Seeded RNG wrapper for reproducible fault injection and jitter.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Thread-safe seeded random number generator.
pub struct MockRng {
    inner: Mutex<ChaCha8Rng>,
}

impl MockRng {
    /// Create a new RNG. `None` seeds from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            inner: Mutex::new(rng),
        }
    }

    /// Returns true with probability `rate` (clamped to 0.0..=1.0).
    pub fn should_fail(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        self.inner.lock().gen::<f64>() < rate
    }

    /// Uniform value in `0..=max`.
    pub fn up_to(&self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        self.inner.lock().gen_range(0..=max)
    }
}

impl Default for MockRng {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for MockRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRng")
            .field("inner", &"<Mutex<ChaCha8Rng>>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_deterministic() {
        let a = MockRng::new(Some(7));
        let b = MockRng::new(Some(7));
        let xs: Vec<u64> = (0..16).map(|_| a.up_to(1000)).collect();
        let ys: Vec<u64> = (0..16).map(|_| b.up_to(1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_should_fail_extremes() {
        let rng = MockRng::new(Some(1));
        assert!((0..100).all(|_| !rng.should_fail(0.0)));
        assert!((0..100).all(|_| rng.should_fail(1.0)));
    }

    #[test]
    fn test_up_to_bounds() {
        let rng = MockRng::new(Some(3));
        assert_eq!(rng.up_to(0), 0);
        assert!((0..200).all(|_| rng.up_to(5) <= 5));
    }
}
