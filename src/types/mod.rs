//! Core types for the diffusion engine.
//!
//! - [`DiffusionConfig`]: Parameters a noise schedule is built from
//! - [`ImageShape`]: Validated `[B, C, H, W]` batch shape

mod config;
mod shape;

// Re-export all types at the module level
pub use config::DiffusionConfig;
pub use shape::ImageShape;
