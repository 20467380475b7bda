//! Noise schedules.
//!
//! - [`builder`]: Linear and cosine beta schedules and the derived coefficients
//! - [`cache`]: Fingerprint-keyed cache sharing one schedule per config

pub mod builder;
pub mod cache;

// Re-export commonly used types
pub use builder::{build, BetaSchedule, NoiseSchedule, COSINE_OFFSET, MAX_COSINE_BETA, MIN_COSINE_BETA};
pub use cache::ScheduleCache;
