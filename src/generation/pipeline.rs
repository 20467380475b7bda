//! Generation pipeline.
//!
//! Ties a diffusion config, a sampler choice and a predictor together into a
//! seeded, reproducible sampling run.

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::error::{DiffusionError, Result};
use crate::output::SampleBatch;
use crate::sampling::{NoisePredictor, SampleParams, SamplerKind, SamplingEngine, SeededNoise};
use crate::schedule::{NoiseSchedule, ScheduleCache};
use crate::types::{DiffusionConfig, ImageShape};

/// Everything needed to reproduce one sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub diffusion: DiffusionConfig,
    pub sampler: SamplerKind,
    pub shape: ImageShape,
    pub params: SampleParams,
    pub seed: u64,
}

impl GenerationRequest {
    /// Builds a request from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let sampling = &config.sampling;
        let sampler = SamplerKind::parse(&sampling.sampler)
            .ok_or_else(|| DiffusionError::unknown_scheduler(&sampling.sampler))?;
        let shape = ImageShape::square(sampling.num_samples, sampling.in_channels, sampling.img_size)?;

        Ok(Self {
            diffusion: config.diffusion.clone(),
            sampler,
            shape,
            params: SampleParams::new(sampling.num_inference_steps, sampling.eta),
            seed: sampling.seed,
        })
    }
}

/// Runs sampling requests, sharing schedules between runs.
#[derive(Debug, Default)]
pub struct Generator {
    cache: ScheduleCache,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ScheduleCache {
        &self.cache
    }

    /// Returns the (cached) schedule for `config`.
    pub fn schedule(&self, config: &DiffusionConfig) -> Result<Arc<NoiseSchedule>> {
        self.cache.get_or_build(config)
    }

    /// Builds the engine a request would run with.
    pub fn engine(&self, request: &GenerationRequest) -> Result<SamplingEngine> {
        let schedule = self.schedule(&request.diffusion)?;
        Ok(SamplingEngine::new(request.sampler, schedule))
    }

    /// Runs a request to completion.
    ///
    /// `on_progress` receives `(completed_steps, total_steps)`.
    pub fn generate<P, F>(
        &self,
        request: &GenerationRequest,
        predictor: &mut P,
        on_progress: F,
    ) -> Result<SampleBatch>
    where
        P: NoisePredictor + ?Sized,
        F: FnMut(usize, usize),
    {
        let engine = self.engine(request)?;
        let calls = engine.model_calls(&request.params)?;
        info!(
            sampler = %request.sampler,
            shape = %request.shape,
            seed = request.seed,
            model_calls = calls,
            schedule = %request.diffusion.fingerprint(),
            "generating samples"
        );

        let mut noise = SeededNoise::from_seed(request.seed);
        let images = engine.sample_with_progress(
            predictor,
            request.shape,
            &request.params,
            &mut noise,
            on_progress,
        )?;

        SampleBatch::from_array(request.sampler.as_str(), request.seed, &images)
    }
}
