//! Seeded generation runs.

pub mod pipeline;

pub use pipeline::{GenerationRequest, Generator};
