//! dit-diffusion: Gaussian diffusion schedules and reverse sampling for images.
//!
//! The crate builds variance-preserving noise schedules, corrupts clean
//! images in closed form, and turns pure noise back into images with a
//! caller-supplied noise predictor, using either full-length ancestral
//! (DDPM) or strided accelerated (DDIM) sampling.
//!
//! # Modules
//!
//! - [`schedule`]: Beta schedules and the shared schedule cache
//! - [`diffusion`]: Forward corruption and training helpers
//! - [`sampling`]: Noise sources, predictors, samplers and the factory
//! - [`generation`]: Seeded generation runs
//! - [`output`]: Sample batch files
//! - [`config`]: Application configuration (AppConfig, SamplingConfig)
//! - [`error`]: Error types and codes (DiffusionError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use dit_diffusion::{
//!     create_sampler, DiffusionConfig, ImageShape, SampleParams, SeededNoise,
//! };
//! use ndarray::{Array1, Array4};
//!
//! let engine = create_sampler("ddim", &DiffusionConfig::default())?;
//! let mut predictor = |xt: &Array4<f32>, _t: &Array1<usize>| Ok(Array4::zeros(xt.raw_dim()));
//! let images = engine.sample(
//!     &mut predictor,
//!     ImageShape::square(4, 3, 32)?,
//!     &SampleParams::new(50, 0.0),
//!     &mut SeededNoise::from_seed(42),
//! )?;
//! ```

pub mod cli;
pub mod config;
pub mod diffusion;
pub mod error;
pub mod generation;
pub mod numeric;
pub mod output;
pub mod sampling;
pub mod schedule;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{AppConfig, SamplingConfig};
pub use diffusion::ForwardDiffusion;
pub use error::{DiffusionError, ErrorCode, Result};
pub use sampling::{
    create_sampler, create_sampler_with_schedule, NoisePredictor, NoiseSource, SampleParams,
    SamplerKind, SamplingEngine, SeededNoise,
};
pub use schedule::{build, NoiseSchedule, ScheduleCache};
pub use types::{DiffusionConfig, ImageShape};
