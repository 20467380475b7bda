//! Accelerated (DDIM) sampler.
//!
//! Visits an evenly strided subset of the training timesteps. Each update
//! estimates the clean image, then re-noises it to the previous subsampled
//! timestep; `eta` scales how much of that re-noising is random.

use std::sync::Arc;

use ndarray::{Array4, Zip};

use super::noise::NoiseSource;
use super::strategy::{SampleParams, SamplingStrategy};
use crate::error::{DiffusionError, Result};
use crate::schedule::NoiseSchedule;

/// Subsampled reverse sampler with tunable stochasticity.
#[derive(Debug, Clone)]
pub struct AcceleratedSampler {
    schedule: Arc<NoiseSchedule>,
}

/// Coefficients of one accelerated update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCoefficients {
    /// alpha_bar at the current timestep.
    pub alpha_cumprod: f64,
    /// alpha_bar at the previous subsampled timestep (1.0 past t = 0).
    pub alpha_cumprod_prev: f64,
    /// Standard deviation of the fresh noise.
    pub sigma: f64,
    /// Weight of the predicted noise in the direction term.
    pub direction: f64,
}

impl AcceleratedSampler {
    pub fn new(schedule: Arc<NoiseSchedule>) -> Self {
        Self { schedule }
    }

    /// Checks `params` against the schedule length.
    pub fn validate(&self, params: &SampleParams) -> Result<()> {
        let total = self.schedule.len();
        if params.num_inference_steps < 1 || params.num_inference_steps > total {
            return Err(DiffusionError::invalid_step_count(
                params.num_inference_steps,
                total,
            ));
        }
        if !(0.0..=1.0).contains(&params.eta) {
            return Err(DiffusionError::config(format!(
                "eta must be in [0, 1], got {}",
                params.eta
            )));
        }
        Ok(())
    }

    /// Distance between consecutive subsampled timesteps, `floor(T / n)`.
    ///
    /// Assumes `params` passed [`validate`](Self::validate).
    pub fn step_ratio(&self, params: &SampleParams) -> usize {
        self.schedule.len() / params.num_inference_steps.max(1)
    }

    /// Previous subsampled timestep, or `None` for the fully denoised state.
    pub fn prev_timestep(&self, t: usize, params: &SampleParams) -> Option<usize> {
        t.checked_sub(self.step_ratio(params))
    }

    /// Computes the update coefficients for timestep `t`.
    pub fn coefficients(&self, t: usize, params: &SampleParams) -> StepCoefficients {
        let acp = self.schedule.alpha_cumprod(t);
        let acp_prev = self
            .schedule
            .alpha_cumprod_or_one(self.prev_timestep(t, params));

        let eta = params.eta as f64;
        let sigma = eta * ((1.0 - acp_prev) / (1.0 - acp) * (1.0 - acp / acp_prev)).sqrt();

        // Rounding can push the radicand a hair below zero when eta = 1
        let direction = (1.0 - acp_prev - sigma * sigma).max(0.0).sqrt();

        StepCoefficients {
            alpha_cumprod: acp,
            alpha_cumprod_prev: acp_prev,
            sigma,
            direction,
        }
    }

    /// The model's estimate of the clean image at timestep `t`.
    pub fn predict_original(&self, t: usize, latent: &Array4<f32>, eps: &Array4<f32>) -> Array4<f32> {
        let acp = self.schedule.alpha_cumprod(t);
        let noise_weight = (1.0 - acp).sqrt() as f32;
        let inv_signal = (1.0 / acp.sqrt()) as f32;
        Zip::from(latent)
            .and(eps)
            .map_collect(|&x, &e| (x - noise_weight * e) * inv_signal)
    }
}

impl SamplingStrategy for AcceleratedSampler {
    fn schedule(&self) -> &NoiseSchedule {
        &self.schedule
    }

    fn timesteps(&self, params: &SampleParams) -> Result<Vec<usize>> {
        self.validate(params)?;
        let ratio = self.step_ratio(params);
        Ok((0..params.num_inference_steps)
            .rev()
            .map(|i| i * ratio)
            .collect())
    }

    fn step<N: NoiseSource + ?Sized>(
        &self,
        t: usize,
        latent: &Array4<f32>,
        eps: &Array4<f32>,
        params: &SampleParams,
        noise: &mut N,
    ) -> Array4<f32> {
        let coefs = self.coefficients(t, params);
        let pred_x0 = self.predict_original(t, latent, eps);

        let signal = coefs.alpha_cumprod_prev.sqrt() as f32;
        let direction = coefs.direction as f32;
        let mut next = Zip::from(&pred_x0)
            .and(eps)
            .map_collect(|&x0, &e| signal * x0 + direction * e);

        // eta = 0 draws nothing, keeping the trajectory a pure function of the start noise
        if coefs.sigma > 0.0 {
            let z = noise.standard_normal(latent.raw_dim());
            next.scaled_add(coefs.sigma as f32, &z);
        }

        next
    }
}
