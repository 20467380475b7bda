//! Reverse sampling engine and sampler factory.
//!
//! [`SamplingEngine`] is a closed set of sampling strategies dispatched by
//! `match`. All variants share one sampling loop: start from pure noise,
//! visit the strategy's timesteps in order, query the predictor, apply the
//! strategy's update.

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array1, Array4};
use tracing::{info, trace};

use super::accelerated::AcceleratedSampler;
use super::ancestral::AncestralSampler;
use super::noise::NoiseSource;
use super::predictor::NoisePredictor;
use super::strategy::{SampleParams, SamplingStrategy};
use crate::error::{DiffusionError, Result};
use crate::numeric::ensure_finite;
use crate::schedule::{build, NoiseSchedule};
use crate::types::{DiffusionConfig, ImageShape};

/// Sampler type for the reverse process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerKind {
    /// DDPM ancestral sampling - every timestep, stochastic.
    Ancestral,
    /// DDIM accelerated sampling - strided timesteps, tunable eta.
    #[default]
    Accelerated,
}

impl SamplerKind {
    /// Parses a sampler kind from its scheduler name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ddpm" => Some(SamplerKind::Ancestral),
            "ddim" => Some(SamplerKind::Accelerated),
            _ => None,
        }
    }

    /// Returns the scheduler name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplerKind::Ancestral => "ddpm",
            SamplerKind::Accelerated => "ddim",
        }
    }
}

impl std::fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reverse sampler holding any strategy.
#[derive(Debug, Clone)]
pub enum SamplingEngine {
    Ancestral(AncestralSampler),
    Accelerated(AcceleratedSampler),
}

impl SamplingEngine {
    /// Creates an engine of the given kind over a shared schedule.
    pub fn new(kind: SamplerKind, schedule: Arc<NoiseSchedule>) -> Self {
        match kind {
            SamplerKind::Ancestral => SamplingEngine::Ancestral(AncestralSampler::new(schedule)),
            SamplerKind::Accelerated => {
                SamplingEngine::Accelerated(AcceleratedSampler::new(schedule))
            }
        }
    }

    pub fn kind(&self) -> SamplerKind {
        match self {
            SamplingEngine::Ancestral(_) => SamplerKind::Ancestral,
            SamplingEngine::Accelerated(_) => SamplerKind::Accelerated,
        }
    }

    pub fn schedule(&self) -> &NoiseSchedule {
        match self {
            SamplingEngine::Ancestral(s) => s.schedule(),
            SamplingEngine::Accelerated(s) => s.schedule(),
        }
    }

    /// Returns the timesteps a run with `params` visits, in order.
    pub fn timesteps(&self, params: &SampleParams) -> Result<Vec<usize>> {
        match self {
            SamplingEngine::Ancestral(s) => s.timesteps(params),
            SamplingEngine::Accelerated(s) => s.timesteps(params),
        }
    }

    /// Returns the number of predictor invocations a run with `params` costs.
    pub fn model_calls(&self, params: &SampleParams) -> Result<usize> {
        match self {
            SamplingEngine::Ancestral(s) => s.model_calls(params),
            SamplingEngine::Accelerated(s) => s.model_calls(params),
        }
    }

    /// Generates a batch of samples shaped `shape`, starting from fresh noise.
    pub fn sample<P, N>(
        &self,
        predictor: &mut P,
        shape: ImageShape,
        params: &SampleParams,
        noise: &mut N,
    ) -> Result<Array4<f32>>
    where
        P: NoisePredictor + ?Sized,
        N: NoiseSource + ?Sized,
    {
        self.sample_with_progress(predictor, shape, params, noise, |_, _| {})
    }

    /// Generates samples, reporting `(completed_steps, total_steps)` after each step.
    ///
    /// The callback runs between steps only.
    pub fn sample_with_progress<P, N, F>(
        &self,
        predictor: &mut P,
        shape: ImageShape,
        params: &SampleParams,
        noise: &mut N,
        on_step: F,
    ) -> Result<Array4<f32>>
    where
        P: NoisePredictor + ?Sized,
        N: NoiseSource + ?Sized,
        F: FnMut(usize, usize),
    {
        // Validate before drawing so a bad request consumes no randomness
        self.timesteps(params)?;
        let initial = noise.standard_normal(shape.dim());
        self.sample_from(predictor, initial, params, noise, on_step)
    }

    /// Runs the reverse process from a caller-supplied initial latent.
    ///
    /// With the accelerated sampler and `eta = 0` the output is a pure
    /// function of `initial` and the predictor.
    pub fn sample_from<P, N, F>(
        &self,
        predictor: &mut P,
        initial: Array4<f32>,
        params: &SampleParams,
        noise: &mut N,
        on_step: F,
    ) -> Result<Array4<f32>>
    where
        P: NoisePredictor + ?Sized,
        N: NoiseSource + ?Sized,
        F: FnMut(usize, usize),
    {
        match self {
            SamplingEngine::Ancestral(s) => run(s, predictor, initial, params, noise, on_step),
            SamplingEngine::Accelerated(s) => run(s, predictor, initial, params, noise, on_step),
        }
    }
}

/// Shared sampling loop.
fn run<S, P, N, F>(
    strategy: &S,
    predictor: &mut P,
    initial: Array4<f32>,
    params: &SampleParams,
    noise: &mut N,
    mut on_step: F,
) -> Result<Array4<f32>>
where
    S: SamplingStrategy,
    P: NoisePredictor + ?Sized,
    N: NoiseSource + ?Sized,
    F: FnMut(usize, usize),
{
    let shape = ImageShape::from_dims(initial.shape())?;
    let timesteps = strategy.timesteps(params)?;
    let total = timesteps.len();

    info!(
        shape = %shape,
        steps = total,
        eta = params.eta,
        "starting reverse sampling"
    );
    let start = Instant::now();

    let mut latent = initial;
    for (i, &t) in timesteps.iter().enumerate() {
        let t_batch = Array1::from_elem(shape.batch, t);
        let eps = predictor.predict(&latent, &t_batch)?;

        if eps.shape() != latent.shape() {
            return Err(DiffusionError::shape(format!(
                "predictor returned shape {:?} for input {:?} at t = {}",
                eps.shape(),
                latent.shape(),
                t
            )));
        }
        ensure_finite(&eps, &format!("noise prediction at t = {}", t))?;

        latent = strategy.step(t, &latent, &eps, params, noise);
        ensure_finite(&latent, &format!("latent after t = {}", t))?;

        trace!(step = i + 1, total, t, "sampling step");
        on_step(i + 1, total);
    }

    info!(
        steps = total,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "reverse sampling finished"
    );
    Ok(latent)
}

/// Creates a sampling engine by scheduler name, building a fresh schedule.
///
/// `name` is case-insensitive: "ddpm" selects ancestral sampling, "ddim"
/// accelerated sampling.
pub fn create_sampler(name: &str, config: &DiffusionConfig) -> Result<SamplingEngine> {
    let kind = SamplerKind::parse(name).ok_or_else(|| DiffusionError::unknown_scheduler(name))?;
    let schedule = Arc::new(build(config)?);
    Ok(SamplingEngine::new(kind, schedule))
}

/// Creates a sampling engine by scheduler name over an existing schedule.
pub fn create_sampler_with_schedule(
    name: &str,
    schedule: Arc<NoiseSchedule>,
) -> Result<SamplingEngine> {
    let kind = SamplerKind::parse(name).ok_or_else(|| DiffusionError::unknown_scheduler(name))?;
    Ok(SamplingEngine::new(kind, schedule))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::numeric::mean_std;
    use crate::sampling::noise::SeededNoise;
    use crate::sampling::predictor::GaussianPriorPredictor;
    use ndarray::Ix4;

    fn zero_predictor(xt: &Array4<f32>, _t: &Array1<usize>) -> Result<Array4<f32>> {
        Ok(Array4::zeros(xt.raw_dim()))
    }

    #[test]
    fn sampler_kind_parsing() {
        assert_eq!(SamplerKind::parse("ddpm"), Some(SamplerKind::Ancestral));
        assert_eq!(SamplerKind::parse("DDIM"), Some(SamplerKind::Accelerated));
        assert_eq!(SamplerKind::parse("DdPm"), Some(SamplerKind::Ancestral));
        assert_eq!(SamplerKind::parse("ddqm"), None);
        assert_eq!(SamplerKind::Ancestral.as_str(), "ddpm");
        assert_eq!(SamplerKind::Accelerated.to_string(), "ddim");
    }

    #[test]
    fn create_sampler_by_name() {
        let config = DiffusionConfig::cosine(100);
        let ddpm = create_sampler("ddpm", &config).unwrap();
        assert!(matches!(ddpm, SamplingEngine::Ancestral(_)));
        let ddim = create_sampler("DDIM", &config).unwrap();
        assert!(matches!(ddim, SamplingEngine::Accelerated(_)));
        assert_eq!(ddim.kind(), SamplerKind::Accelerated);
    }

    #[test]
    fn create_sampler_unknown_name() {
        let err = create_sampler("ddqm", &DiffusionConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
        assert!(err.message.contains("unknown scheduler"));
    }

    #[test]
    fn create_sampler_shares_schedule() {
        let schedule = Arc::new(build(&DiffusionConfig::cosine(50)).unwrap());
        let a = create_sampler_with_schedule("ddpm", Arc::clone(&schedule)).unwrap();
        let b = create_sampler_with_schedule("ddim", Arc::clone(&schedule)).unwrap();
        assert!(std::ptr::eq(a.schedule(), b.schedule()));
        assert!(create_sampler_with_schedule("euler", schedule).is_err());
    }

    #[test]
    fn output_shape_matches_request() {
        let config = DiffusionConfig::cosine(20);
        let shape = ImageShape::square(3, 2, 4).unwrap();
        for name in ["ddpm", "ddim"] {
            let engine = create_sampler(name, &config).unwrap();
            let out = engine
                .sample(
                    &mut zero_predictor,
                    shape,
                    &SampleParams::new(5, 0.5),
                    &mut SeededNoise::from_seed(0),
                )
                .unwrap();
            assert_eq!(out.shape(), &[3, 2, 4, 4]);
        }
    }

    #[test]
    fn predictor_called_once_per_timestep() {
        let config = DiffusionConfig::cosine(40);
        let shape = ImageShape::square(2, 1, 2).unwrap();

        for (name, expected) in [("ddpm", 40), ("ddim", 8)] {
            let engine = create_sampler(name, &config).unwrap();
            let mut seen = Vec::new();
            let mut predictor = |xt: &Array4<f32>, t: &Array1<usize>| -> Result<Array4<f32>> {
                assert_eq!(t.len(), 2);
                assert!(t.iter().all(|&v| v == t[0]));
                seen.push(t[0]);
                Ok(Array4::zeros(xt.raw_dim()))
            };
            engine
                .sample(&mut predictor, shape, &SampleParams::new(8, 0.0), &mut SeededNoise::from_seed(1))
                .unwrap();
            assert_eq!(seen.len(), expected);
            assert_eq!(seen, engine.timesteps(&SampleParams::new(8, 0.0)).unwrap());
        }
    }

    #[test]
    fn progress_reports_every_step() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(100)).unwrap();
        let shape = ImageShape::square(1, 1, 2).unwrap();
        let mut reports = Vec::new();
        engine
            .sample_with_progress(
                &mut zero_predictor,
                shape,
                &SampleParams::new(10, 0.0),
                &mut SeededNoise::from_seed(0),
                |step, total| reports.push((step, total)),
            )
            .unwrap();
        assert_eq!(reports.len(), 10);
        assert_eq!(reports[0], (1, 10));
        assert_eq!(reports[9], (10, 10));
    }

    #[test]
    fn eta_zero_is_deterministic_from_initial_noise() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(200)).unwrap();
        let initial = SeededNoise::from_seed(11).standard_normal(Ix4(2, 3, 4, 4));
        let params = SampleParams::new(25, 0.0);
        let schedule = Arc::new(engine.schedule().clone());

        let mut p1 = GaussianPriorPredictor::standard(Arc::clone(&schedule));
        let mut p2 = GaussianPriorPredictor::standard(schedule);
        let a = engine
            .sample_from(&mut p1, initial.clone(), &params, &mut SeededNoise::from_seed(1), |_, _| {})
            .unwrap();
        let b = engine
            .sample_from(&mut p2, initial, &params, &mut SeededNoise::from_seed(2), |_, _| {})
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_seed_reproduces_ancestral_run() {
        let engine = create_sampler("ddpm", &DiffusionConfig::cosine(30)).unwrap();
        let shape = ImageShape::square(1, 1, 4).unwrap();
        let params = SampleParams::default();
        let a = engine
            .sample(&mut zero_predictor, shape, &params, &mut SeededNoise::from_seed(5))
            .unwrap();
        let b = engine
            .sample(&mut zero_predictor, shape, &params, &mut SeededNoise::from_seed(5))
            .unwrap();
        let c = engine
            .sample(&mut zero_predictor, shape, &params, &mut SeededNoise::from_seed(6))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ancestral_with_exact_predictor_preserves_unit_variance() {
        let engine = create_sampler("ddpm", &DiffusionConfig::cosine(100)).unwrap();
        let schedule = Arc::new(engine.schedule().clone());
        let mut predictor = GaussianPriorPredictor::standard(schedule);
        let shape = ImageShape::square(4, 1, 16).unwrap();

        let out = engine
            .sample(&mut predictor, shape, &SampleParams::default(), &mut SeededNoise::from_seed(3))
            .unwrap();
        let (mean, std) = mean_std(&out);
        assert!(mean.abs() < 0.15, "mean {}", mean);
        assert!((std - 1.0).abs() < 0.1, "std {}", std);
    }

    #[test]
    fn accelerated_with_exact_predictor_matches_prior() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(1000)).unwrap();
        let schedule = Arc::new(engine.schedule().clone());
        let mut predictor = GaussianPriorPredictor::new(schedule, 0.5, 0.5).unwrap();
        let shape = ImageShape::square(4, 1, 16).unwrap();

        let out = engine
            .sample(&mut predictor, shape, &SampleParams::new(100, 0.0), &mut SeededNoise::from_seed(4))
            .unwrap();
        let (mean, std) = mean_std(&out);
        assert!((mean - 0.5).abs() < 0.1, "mean {}", mean);
        assert!((std - 0.5).abs() < 0.1, "std {}", std);
    }

    #[test]
    fn invalid_params_fail_before_sampling() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(10)).unwrap();
        let shape = ImageShape::square(1, 1, 2).unwrap();
        let mut calls = 0;
        let mut predictor = |xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            calls += 1;
            Ok(Array4::zeros(xt.raw_dim()))
        };
        let err = engine
            .sample(&mut predictor, shape, &SampleParams::new(11, 0.0), &mut SeededNoise::from_seed(0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
        drop(predictor);
        assert_eq!(calls, 0);
    }

    #[test]
    fn wrong_prediction_shape_aborts() {
        let engine = create_sampler("ddpm", &DiffusionConfig::cosine(10)).unwrap();
        let shape = ImageShape::square(2, 1, 4).unwrap();
        let mut predictor = |_xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            Ok(Array4::zeros((1, 1, 4, 4)))
        };
        let err = engine
            .sample(&mut predictor, shape, &SampleParams::default(), &mut SeededNoise::from_seed(0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ShapeError);
    }

    #[test]
    fn predictor_failure_aborts_run() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(100)).unwrap();
        let shape = ImageShape::square(1, 1, 2).unwrap();
        let mut calls = 0;
        let mut predictor = |xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            calls += 1;
            if calls == 3 {
                return Err(DiffusionError::predictor_failed("device lost"));
            }
            Ok(Array4::zeros(xt.raw_dim()))
        };
        let err = engine
            .sample(&mut predictor, shape, &SampleParams::new(10, 0.0), &mut SeededNoise::from_seed(0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PredictorFailed);
        drop(predictor);
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_finite_prediction_is_numeric_error() {
        let engine = create_sampler("ddim", &DiffusionConfig::cosine(10)).unwrap();
        let shape = ImageShape::square(1, 1, 2).unwrap();
        let mut predictor = |xt: &Array4<f32>, _t: &Array1<usize>| -> Result<Array4<f32>> {
            Ok(Array4::from_elem(xt.raw_dim(), f32::NAN))
        };
        let err = engine
            .sample(&mut predictor, shape, &SampleParams::new(5, 0.0), &mut SeededNoise::from_seed(0))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NumericError);
    }
}
