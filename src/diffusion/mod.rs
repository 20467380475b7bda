//! Forward diffusion and training helpers.

pub mod forward;
pub mod training;

pub use forward::ForwardDiffusion;
pub use training::{denoising_loss, sample_timesteps, training_batch, TrainingBatch};
