//! Training-side helpers around the forward process.
//!
//! These build the inputs and the objective of the standard denoising loss;
//! optimisation itself lives with whoever owns the predictor.

use ndarray::{Array1, Array4, Axis};

use super::forward::ForwardDiffusion;
use crate::error::{DiffusionError, Result};
use crate::numeric::{ensure_finite, mean_squared_error};
use crate::sampling::{NoisePredictor, NoiseSource};

/// One corrupted minibatch with its targets.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    /// Corrupted images.
    pub xt: Array4<f32>,
    /// Timestep of each image.
    pub t: Array1<usize>,
    /// Noise the predictor should recover.
    pub noise: Array4<f32>,
}

/// Draws `batch` timesteps uniformly from `[0, timesteps)`.
pub fn sample_timesteps<N>(batch: usize, timesteps: usize, rng: &mut N) -> Result<Array1<usize>>
where
    N: NoiseSource + ?Sized,
{
    if timesteps == 0 {
        return Err(DiffusionError::config("cannot draw timesteps from an empty schedule"));
    }
    Ok(Array1::from_shape_fn(batch, |_| rng.uniform_index(timesteps)))
}

/// Corrupts `x0` to random timesteps with fresh noise.
///
/// Timesteps are drawn before the noise.
pub fn training_batch<N>(forward: &ForwardDiffusion<'_>, x0: &Array4<f32>, rng: &mut N) -> Result<TrainingBatch>
where
    N: NoiseSource + ?Sized,
{
    let t = sample_timesteps(x0.len_of(Axis(0)), forward.schedule().len(), rng)?;
    let noise = rng.standard_normal_like(x0);
    let xt = forward.corrupt(x0, &t, Some(&noise), rng)?;
    Ok(TrainingBatch { xt, t, noise })
}

/// Mean squared error between the predictor's noise estimate and the true noise.
pub fn denoising_loss<P, N>(
    predictor: &mut P,
    forward: &ForwardDiffusion<'_>,
    x0: &Array4<f32>,
    rng: &mut N,
) -> Result<f32>
where
    P: NoisePredictor + ?Sized,
    N: NoiseSource + ?Sized,
{
    let batch = training_batch(forward, x0, rng)?;
    let eps = predictor.predict(&batch.xt, &batch.t)?;
    if eps.shape() != batch.noise.shape() {
        return Err(DiffusionError::shape(format!(
            "predictor returned shape {:?} for input {:?}",
            eps.shape(),
            batch.noise.shape()
        )));
    }
    ensure_finite(&eps, "noise prediction")?;
    mean_squared_error(&eps, &batch.noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::sampling::{GaussianPriorPredictor, SeededNoise};
    use crate::schedule::build;
    use crate::types::DiffusionConfig;
    use std::sync::Arc;

    #[test]
    fn timesteps_stay_in_range() {
        let mut rng = SeededNoise::from_seed(3);
        let t = sample_timesteps(500, 7, &mut rng).unwrap();
        assert_eq!(t.len(), 500);
        assert!(t.iter().all(|&v| v < 7));
        // 500 draws over 7 values hit every one
        for v in 0..7 {
            assert!(t.iter().any(|&x| x == v));
        }
        assert!(sample_timesteps(4, 0, &mut rng).is_err());
    }

    #[test]
    fn batch_is_consistent_with_forward_process() {
        let schedule = build(&DiffusionConfig::cosine(50)).unwrap();
        let forward = ForwardDiffusion::new(&schedule);
        let x0 = Array4::from_elem((3, 1, 2, 2), 0.5f32);
        let batch = training_batch(&forward, &x0, &mut SeededNoise::from_seed(8)).unwrap();

        let expected = forward
            .corrupt(&x0, &batch.t, Some(&batch.noise), &mut SeededNoise::from_seed(0))
            .unwrap();
        assert_eq!(batch.xt, expected);
        assert_eq!(batch.t.len(), 3);
    }

    #[test]
    fn oracle_predictor_beats_zero_predictor() {
        let schedule = Arc::new(build(&DiffusionConfig::cosine(100)).unwrap());
        let forward = ForwardDiffusion::new(&schedule);
        let x0 = SeededNoise::from_seed(1).standard_normal(ndarray::Ix4(8, 1, 8, 8));

        let mut oracle = GaussianPriorPredictor::standard(Arc::clone(&schedule));
        let mut zero = |xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            Ok(Array4::zeros(xt.raw_dim()))
        };

        let oracle_loss = denoising_loss(&mut oracle, &forward, &x0, &mut SeededNoise::from_seed(2)).unwrap();
        let zero_loss = denoising_loss(&mut zero, &forward, &x0, &mut SeededNoise::from_seed(2)).unwrap();
        assert!(oracle_loss < zero_loss);
        assert!((zero_loss - 1.0).abs() < 0.2);
    }

    #[test]
    fn loss_rejects_misshapen_prediction() {
        let schedule = build(&DiffusionConfig::cosine(10)).unwrap();
        let forward = ForwardDiffusion::new(&schedule);
        let x0 = Array4::zeros((2, 1, 2, 2));
        let mut bad = |_xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            Ok(Array4::zeros((2, 1, 4, 4)))
        };
        let err = denoising_loss(&mut bad, &forward, &x0, &mut SeededNoise::from_seed(0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeError);
    }
}
