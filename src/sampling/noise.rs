//! Injected randomness.
//!
//! Every random draw the engine makes goes through a [`NoiseSource`], so a
//! run is reproducible exactly when its noise source is.

use ndarray::{Array4, Ix4};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal, Uniform};

/// Source of standard-normal noise tensors and uniform timestep draws.
pub trait NoiseSource {
    /// Returns a tensor of independent N(0, 1) samples with shape `dim`.
    fn standard_normal(&mut self, dim: Ix4) -> Array4<f32>;

    /// Returns an integer drawn uniformly from `[0, upper)`. Panics if `upper == 0`.
    fn uniform_index(&mut self, upper: usize) -> usize;

    /// Returns N(0, 1) noise shaped like `arr`.
    fn standard_normal_like(&mut self, arr: &Array4<f32>) -> Array4<f32> {
        self.standard_normal(arr.raw_dim())
    }
}

/// Noise source backed by a seeded ChaCha8 generator.
#[derive(Debug, Clone)]
pub struct SeededNoise {
    rng: ChaCha8Rng,
}

impl SeededNoise {
    /// Creates a reproducible noise source from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl NoiseSource for SeededNoise {
    fn standard_normal(&mut self, dim: Ix4) -> Array4<f32> {
        generate_noise(dim, &mut self.rng)
    }

    fn uniform_index(&mut self, upper: usize) -> usize {
        Uniform::new(0, upper).sample(&mut self.rng)
    }
}

/// Generates random noise with the given shape.
fn generate_noise(dim: Ix4, rng: &mut ChaCha8Rng) -> Array4<f32> {
    Array4::from_shape_simple_fn(dim, || StandardNormal.sample(rng))
}
