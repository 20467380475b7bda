//! Reverse sampling.
//!
//! - [`noise`]: Injected randomness
//! - [`predictor`]: The noise predictor capability
//! - [`strategy`]: The update-rule trait and its parameters
//! - [`ancestral`]: Full-length DDPM sampling
//! - [`accelerated`]: Strided DDIM sampling
//! - [`engine`]: The engine enum, shared loop, and factory

pub mod accelerated;
pub mod ancestral;
pub mod engine;
pub mod noise;
pub mod predictor;
pub mod strategy;

pub use accelerated::{AcceleratedSampler, StepCoefficients};
pub use ancestral::AncestralSampler;
pub use engine::{create_sampler, create_sampler_with_schedule, SamplerKind, SamplingEngine};
pub use noise::{NoiseSource, SeededNoise};
pub use predictor::{GaussianPriorPredictor, NoisePredictor};
pub use strategy::{SampleParams, SamplingStrategy, DEFAULT_ETA, DEFAULT_INFERENCE_STEPS};
