use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Uniform draws without replacement. Fine for contests, not for anything
/// security sensitive.
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    /// Seed once per process from the current time.
    pub fn from_time_seed() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_seed(seed)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` distinct indices in `[0, population)`, in draw order.
    /// Asking for at least `population` returns every index once.
    pub fn sample(&mut self, population: usize, count: usize) -> Vec<usize> {
        if count >= population {
            return (0..population).collect();
        }

        let mut seen = HashSet::with_capacity(count);
        let mut drawn = Vec::with_capacity(count);
        while drawn.len() < count {
            let index = self.rng.gen_range(0..population);
            if seen.insert(index) {
                drawn.push(index);
            }
        }
        drawn
    }

    pub fn pick<T: Clone>(&mut self, population: &[T], count: usize) -> Vec<T> {
        self.sample(population.len(), count)
            .into_iter()
            .map(|i| population[i].clone())
            .collect()
    }
}
