//! Writing generated samples.

pub mod samples;

pub use samples::{normalize_images, read_samples, write_samples, SampleBatch};
