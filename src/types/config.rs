//! DiffusionConfig type for noise schedule parameters.
//!
//! Holds the parameters a [`NoiseSchedule`](crate::schedule::NoiseSchedule)
//! is derived from. Two configs with equal fields always produce the same
//! schedule, which is what [`DiffusionConfig::fingerprint`] keys on.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schedule::BetaSchedule;

/// Parameters of the variance-preserving diffusion process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    /// Number of diffusion timesteps (T).
    pub timesteps: usize,

    /// Beta schedule name: "linear" or "cosine".
    pub beta_schedule: String,

    /// First beta of the linear schedule.
    pub beta_start: f64,

    /// Last beta of the linear schedule.
    pub beta_end: f64,
}

impl DiffusionConfig {
    /// Creates a linear-schedule config.
    pub fn linear(timesteps: usize, beta_start: f64, beta_end: f64) -> Self {
        Self {
            timesteps,
            beta_schedule: BetaSchedule::Linear.as_str().to_string(),
            beta_start,
            beta_end,
        }
    }

    /// Creates a cosine-schedule config.
    pub fn cosine(timesteps: usize) -> Self {
        Self {
            timesteps,
            beta_schedule: BetaSchedule::Cosine.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.timesteps == 0 {
            return Some("timesteps must be >= 1".to_string());
        }

        let schedule = match BetaSchedule::parse(&self.beta_schedule) {
            Some(schedule) => schedule,
            None => return Some(format!("unknown beta schedule: '{}'", self.beta_schedule)),
        };

        if schedule == BetaSchedule::Linear {
            let ordered = 0.0 < self.beta_start
                && self.beta_start < self.beta_end
                && self.beta_end < 1.0;
            if !ordered {
                return Some(format!(
                    "linear schedule needs 0 < beta_start < beta_end < 1, got {} and {}",
                    self.beta_start, self.beta_end
                ));
            }
        }

        None
    }

    /// Computes a deterministic fingerprint of the schedule parameters.
    ///
    /// The fingerprint is the first 16 hex characters of the SHA256 hash of
    /// `{timesteps}:{beta_schedule}:{beta_start}:{beta_end}`. The schedule
    /// name is lowercased so "Cosine" and "cosine" share a fingerprint, and
    /// the beta bounds are left out for cosine schedules which ignore them.
    pub fn fingerprint(&self) -> String {
        let schedule = self.beta_schedule.to_lowercase();
        let input = if schedule == BetaSchedule::Cosine.as_str() {
            format!("{}:{}", self.timesteps, schedule)
        } else {
            format!(
                "{}:{}:{:e}:{:e}",
                self.timesteps, schedule, self.beta_start, self.beta_end
            )
        };
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            timesteps: 1000,
            beta_schedule: BetaSchedule::Cosine.as_str().to_string(),
            beta_start: 1e-4,
            beta_end: 0.02,
        }
    }
}
