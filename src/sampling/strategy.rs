//! Sampling strategy trait shared by the reverse samplers.

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::noise::NoiseSource;
use crate::error::Result;
use crate::schedule::NoiseSchedule;

/// Default number of accelerated sampling steps.
pub const DEFAULT_INFERENCE_STEPS: usize = 50;

/// Default stochasticity of accelerated sampling (fully deterministic).
pub const DEFAULT_ETA: f32 = 0.0;

/// Strategy-specific sampling parameters.
///
/// Only the accelerated sampler reads these; the ancestral sampler always
/// visits every timestep and ignores them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    /// Number of subsampled timesteps (1..=T).
    pub num_inference_steps: usize,
    /// Noise scale in [0, 1]; 0 is deterministic, 1 matches ancestral noise.
    pub eta: f32,
}

impl SampleParams {
    pub fn new(num_inference_steps: usize, eta: f32) -> Self {
        Self {
            num_inference_steps,
            eta,
        }
    }
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            eta: DEFAULT_ETA,
        }
    }
}

/// A reverse-diffusion update rule.
///
/// The shared sampling loop asks a strategy which timesteps to visit, calls
/// the predictor at each one, and hands the prediction back to [`step`].
///
/// [`step`]: SamplingStrategy::step
pub trait SamplingStrategy {
    /// Returns the noise schedule this strategy samples with.
    fn schedule(&self) -> &NoiseSchedule;

    /// Returns the strictly decreasing timesteps to visit.
    fn timesteps(&self, params: &SampleParams) -> Result<Vec<usize>>;

    /// Computes the next latent from the current one and the predicted noise at `t`.
    fn step<N: NoiseSource + ?Sized>(
        &self,
        t: usize,
        latent: &Array4<f32>,
        eps: &Array4<f32>,
        params: &SampleParams,
        noise: &mut N,
    ) -> Array4<f32>;

    /// Returns how many predictor invocations a run with `params` costs.
    fn model_calls(&self, params: &SampleParams) -> Result<usize> {
        Ok(self.timesteps(params)?.len())
    }
}
