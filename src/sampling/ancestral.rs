//! Ancestral (DDPM) sampler.
//!
//! Runs the full reverse Markov chain, one transition per training timestep,
//! adding fresh Gaussian noise at every step except the last.

use std::sync::Arc;

use ndarray::{Array4, Zip};

use super::noise::NoiseSource;
use super::strategy::{SampleParams, SamplingStrategy};
use crate::error::Result;
use crate::schedule::NoiseSchedule;

/// Full-length stochastic reverse sampler.
#[derive(Debug, Clone)]
pub struct AncestralSampler {
    schedule: Arc<NoiseSchedule>,
}

impl AncestralSampler {
    pub fn new(schedule: Arc<NoiseSchedule>) -> Self {
        Self { schedule }
    }

    /// Posterior-mean coefficients `(1/sqrt(alpha_t), (1-alpha_t)/sqrt(1-alpha_bar_t))`.
    pub fn mean_coefficients(&self, t: usize) -> (f64, f64) {
        let alpha = self.schedule.alpha(t);
        let acp = self.schedule.alpha_cumprod(t);
        (1.0 / alpha.sqrt(), (1.0 - alpha) / (1.0 - acp).sqrt())
    }
}

impl SamplingStrategy for AncestralSampler {
    fn schedule(&self) -> &NoiseSchedule {
        &self.schedule
    }

    fn timesteps(&self, _params: &SampleParams) -> Result<Vec<usize>> {
        Ok((0..self.schedule.len()).rev().collect())
    }

    fn step<N: NoiseSource + ?Sized>(
        &self,
        t: usize,
        latent: &Array4<f32>,
        eps: &Array4<f32>,
        _params: &SampleParams,
        noise: &mut N,
    ) -> Array4<f32> {
        let (coef1, coef2) = self.mean_coefficients(t);
        let (coef1, coef2) = (coef1 as f32, coef2 as f32);

        let mut next = Zip::from(latent)
            .and(eps)
            .map_collect(|&x, &e| coef1 * (x - coef2 * e));

        // Terminal step is the posterior mean, no noise
        if t > 0 {
            let sigma = self.schedule.beta(t).sqrt() as f32;
            let z = noise.standard_normal(latent.raw_dim());
            next.scaled_add(sigma, &z);
        }

        next
    }
}
