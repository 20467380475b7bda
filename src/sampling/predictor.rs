//! Noise predictor capability.
//!
//! The engine never builds or trains a network; it only needs something that
//! maps a noisy batch and its timesteps to a noise estimate of the same shape.

use std::sync::Arc;

use ndarray::{Array1, Array4, Axis, Zip};

use crate::error::{DiffusionError, Result};
use crate::schedule::NoiseSchedule;

/// Estimates the noise component of a corrupted batch.
///
/// Implementations must accept every timestep in `[0, T)` and return a
/// tensor shaped exactly like `xt`.
pub trait NoisePredictor {
    fn predict(&mut self, xt: &Array4<f32>, t: &Array1<usize>) -> Result<Array4<f32>>;
}

impl<F> NoisePredictor for F
where
    F: FnMut(&Array4<f32>, &Array1<usize>) -> Result<Array4<f32>>,
{
    fn predict(&mut self, xt: &Array4<f32>, t: &Array1<usize>) -> Result<Array4<f32>> {
        self(xt, t)
    }
}

/// Exact noise predictor for data drawn i.i.d. from `N(mean, std²)`.
///
/// For such data `x_t = sqrt(a)·x0 + sqrt(1-a)·eps` is Gaussian, and the
/// posterior mean of the noise is
/// `sqrt(1-a)·(x_t - sqrt(a)·mean) / (a·std² + 1 - a)`.
/// Sampling with this predictor should reproduce the prior, which makes it
/// a reference model for the samplers.
#[derive(Debug, Clone)]
pub struct GaussianPriorPredictor {
    schedule: Arc<NoiseSchedule>,
    mean: f32,
    std: f32,
}

impl GaussianPriorPredictor {
    /// Creates a predictor for the prior `N(mean, std²)`.
    pub fn new(schedule: Arc<NoiseSchedule>, mean: f32, std: f32) -> Result<Self> {
        if !(std.is_finite() && std > 0.0) || !mean.is_finite() {
            return Err(DiffusionError::config(format!(
                "Gaussian prior needs a finite mean and std > 0, got mean={} std={}",
                mean, std
            )));
        }
        Ok(Self {
            schedule,
            mean,
            std,
        })
    }

    /// Standard normal prior.
    pub fn standard(schedule: Arc<NoiseSchedule>) -> Self {
        Self {
            schedule,
            mean: 0.0,
            std: 1.0,
        }
    }

    pub fn mean(&self) -> f32 {
        self.mean
    }

    pub fn std(&self) -> f32 {
        self.std
    }
}

impl NoisePredictor for GaussianPriorPredictor {
    fn predict(&mut self, xt: &Array4<f32>, t: &Array1<usize>) -> Result<Array4<f32>> {
        if t.len() != xt.len_of(Axis(0)) {
            return Err(DiffusionError::shape(format!(
                "timestep batch {} does not match image batch {}",
                t.len(),
                xt.len_of(Axis(0))
            )));
        }

        let mut eps = Array4::<f32>::zeros(xt.raw_dim());
        for ((mut out, x), &step) in eps
            .outer_iter_mut()
            .zip(xt.outer_iter())
            .zip(t.iter())
        {
            self.schedule.check_timestep(step)?;
            let acp = self.schedule.alpha_cumprod(step);
            let signal = acp.sqrt();
            let noise = (1.0 - acp).sqrt();
            let variance = acp * (self.std as f64).powi(2) + (1.0 - acp);

            let scale = (noise / variance) as f32;
            let offset = (signal * self.mean as f64) as f32;
            Zip::from(&mut out)
                .and(&x)
                .for_each(|e, &v| *e = scale * (v - offset));
        }

        Ok(eps)
    }
}
