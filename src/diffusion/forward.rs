//! Forward (noising) process.

use ndarray::{Array1, Array4, Axis, Zip};

use crate::error::{DiffusionError, Result};
use crate::sampling::NoiseSource;
use crate::schedule::NoiseSchedule;

/// Corrupts clean images to arbitrary timesteps in closed form.
///
/// `x_t = sqrt(alpha_bar_t) * x_0 + sqrt(1 - alpha_bar_t) * noise`
#[derive(Debug, Clone, Copy)]
pub struct ForwardDiffusion<'a> {
    schedule: &'a NoiseSchedule,
}

impl<'a> ForwardDiffusion<'a> {
    pub fn new(schedule: &'a NoiseSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &'a NoiseSchedule {
        self.schedule
    }

    /// Weight of the clean image at `t`, `sqrt(alpha_bar_t)`. Panics if `t >= T`.
    pub fn signal_weight(&self, t: usize) -> f64 {
        self.schedule.alpha_cumprod(t).sqrt()
    }

    /// Weight of the noise at `t`, `sqrt(1 - alpha_bar_t)`. Panics if `t >= T`.
    pub fn noise_weight(&self, t: usize) -> f64 {
        (1.0 - self.schedule.alpha_cumprod(t)).sqrt()
    }

    /// Corrupts each image `x0[b]` to timestep `t[b]`.
    ///
    /// When `noise` is `None` a fresh standard-normal tensor is drawn from
    /// `rng`; otherwise `rng` is left untouched.
    pub fn corrupt<N>(
        &self,
        x0: &Array4<f32>,
        t: &Array1<usize>,
        noise: Option<&Array4<f32>>,
        rng: &mut N,
    ) -> Result<Array4<f32>>
    where
        N: NoiseSource + ?Sized,
    {
        let batch = x0.len_of(Axis(0));
        if t.len() != batch {
            return Err(DiffusionError::shape(format!(
                "got {} timesteps for a batch of {}",
                t.len(),
                batch
            )));
        }
        for &step in t.iter() {
            self.schedule.check_timestep(step)?;
        }

        let drawn;
        let noise = match noise {
            Some(n) => {
                if n.shape() != x0.shape() {
                    return Err(DiffusionError::shape(format!(
                        "noise shape {:?} does not match image shape {:?}",
                        n.shape(),
                        x0.shape()
                    )));
                }
                n
            }
            None => {
                drawn = rng.standard_normal_like(x0);
                &drawn
            }
        };

        let mut xt = Array4::<f32>::zeros(x0.raw_dim());
        for (((mut out, clean), eps), &step) in xt
            .outer_iter_mut()
            .zip(x0.outer_iter())
            .zip(noise.outer_iter())
            .zip(t.iter())
        {
            let signal = self.signal_weight(step) as f32;
            let sigma = self.noise_weight(step) as f32;
            Zip::from(&mut out)
                .and(&clean)
                .and(&eps)
                .for_each(|o, &x, &e| *o = signal * x + sigma * e);
        }

        Ok(xt)
    }
}
