//! Application configuration.
//!
//! Settings come from defaults, then an optional JSON file, then `DIT_*`
//! environment variables. Environment values that fail to parse or fall
//! outside their valid range are ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DiffusionError, ErrorCode, Result};
use crate::sampling::{SamplerKind, DEFAULT_ETA, DEFAULT_INFERENCE_STEPS};
use crate::schedule::BetaSchedule;
use crate::types::DiffusionConfig;

/// Sampling settings for generation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Scheduler name: "ddpm" or "ddim".
    pub sampler: String,

    /// Accelerated sampling steps. Ignored by "ddpm".
    pub num_inference_steps: usize,

    /// Accelerated sampling stochasticity in [0, 1]. Ignored by "ddpm".
    pub eta: f32,

    /// Images per batch.
    pub num_samples: usize,

    /// Image height and width.
    pub img_size: usize,

    pub in_channels: usize,

    pub seed: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sampler: SamplerKind::Accelerated.as_str().to_string(),
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            eta: DEFAULT_ETA,
            num_samples: 4,
            img_size: 32,
            in_channels: 3,
            seed: 42,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub diffusion: DiffusionConfig,

    pub sampling: SamplingConfig,

    /// Directory for sample files.
    /// If None, uses the platform-specific default data location.
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DiffusionError::io(format!("Failed to read config {}", path.display()), e))?;
        serde_json::from_str(&content).map_err(|e| {
            DiffusionError::with_source(
                ErrorCode::ConfigError,
                format!("Invalid config file {}", path.display()),
                e,
            )
        })
    }

    /// Applies overrides from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `DIT_TIMESTEPS` - Number of diffusion timesteps
    /// - `DIT_BETA_SCHEDULE` - Beta schedule (linear, cosine)
    /// - `DIT_BETA_START` - First linear beta
    /// - `DIT_BETA_END` - Last linear beta
    /// - `DIT_SAMPLER` - Scheduler (ddpm, ddim)
    /// - `DIT_STEPS` - Accelerated sampling steps
    /// - `DIT_ETA` - Accelerated sampling eta
    /// - `DIT_SEED` - Random seed
    /// - `DIT_OUTPUT_DIR` - Output directory
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(timesteps) = lookup("DIT_TIMESTEPS").and_then(|s| s.parse::<usize>().ok()) {
            if timesteps > 0 {
                self.diffusion.timesteps = timesteps;
            }
        }

        if let Some(schedule) = lookup("DIT_BETA_SCHEDULE") {
            if let Some(kind) = BetaSchedule::parse(&schedule) {
                self.diffusion.beta_schedule = kind.as_str().to_string();
            }
        }

        if let Some(start) = lookup("DIT_BETA_START").and_then(|s| s.parse::<f64>().ok()) {
            if start > 0.0 && start < 1.0 {
                self.diffusion.beta_start = start;
            }
        }

        if let Some(end) = lookup("DIT_BETA_END").and_then(|s| s.parse::<f64>().ok()) {
            if end > 0.0 && end < 1.0 {
                self.diffusion.beta_end = end;
            }
        }

        if let Some(sampler) = lookup("DIT_SAMPLER") {
            if let Some(kind) = SamplerKind::parse(&sampler) {
                self.sampling.sampler = kind.as_str().to_string();
            }
        }

        if let Some(steps) = lookup("DIT_STEPS").and_then(|s| s.parse::<usize>().ok()) {
            if steps > 0 {
                self.sampling.num_inference_steps = steps;
            }
        }

        if let Some(eta) = lookup("DIT_ETA").and_then(|s| s.parse::<f32>().ok()) {
            if (0.0..=1.0).contains(&eta) {
                self.sampling.eta = eta;
            }
        }

        if let Some(seed) = lookup("DIT_SEED").and_then(|s| s.parse::<u64>().ok()) {
            self.sampling.seed = seed;
        }

        if let Some(dir) = lookup("DIT_OUTPUT_DIR") {
            if !dir.is_empty() {
                self.output_dir = Some(PathBuf::from(dir));
            }
        }

        self
    }

    /// Returns the effective output directory, using platform defaults if not specified.
    pub fn effective_output_dir(&self) -> PathBuf {
        if let Some(ref path) = self.output_dir {
            path.clone()
        } else {
            default_output_dir()
        }
    }

    /// Checks the whole configuration, failing with CONFIG_ERROR on the first problem.
    pub fn validate(&self) -> Result<()> {
        if let Some(reason) = self.diffusion.validate() {
            return Err(DiffusionError::config(reason));
        }

        let sampling = &self.sampling;
        let kind = SamplerKind::parse(&sampling.sampler)
            .ok_or_else(|| DiffusionError::unknown_scheduler(&sampling.sampler))?;

        if kind == SamplerKind::Accelerated {
            let total = self.diffusion.timesteps;
            if sampling.num_inference_steps < 1 || sampling.num_inference_steps > total {
                return Err(DiffusionError::invalid_step_count(
                    sampling.num_inference_steps,
                    total,
                ));
            }
            if !(0.0..=1.0).contains(&sampling.eta) {
                return Err(DiffusionError::config(format!(
                    "eta must be in [0, 1], got {}",
                    sampling.eta
                )));
            }
        }

        if sampling.num_samples == 0 || sampling.img_size == 0 || sampling.in_channels == 0 {
            return Err(DiffusionError::config(
                "num_samples, img_size and in_channels must be > 0",
            ));
        }

        Ok(())
    }
}

/// Returns the platform-specific default sample output path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Application Support/dit-diffusion/samples
/// - Linux: ~/.local/share/dit-diffusion/samples
/// - Windows: C:\Users\<user>\AppData\Roaming\dit-diffusion\data\samples
fn default_output_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "dit-diffusion") {
        proj_dirs.data_dir().join("samples")
    } else {
        // Fallback to current directory
        PathBuf::from("./samples")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn sampling_defaults() {
        let config = SamplingConfig::default();
        assert_eq!(config.sampler, "ddim");
        assert_eq!(config.num_inference_steps, 50);
        assert_eq!(config.eta, 0.0);
        assert_eq!(config.num_samples, 4);
        assert_eq!(config.img_size, 32);
        assert_eq!(config.in_channels, 3);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::new().validate().is_ok());
    }

    #[test]
    fn validation_failures() {
        let mut config = AppConfig::new();
        config.sampling.sampler = "ddqm".to_string();
        assert_eq!(config.validate().unwrap_err().code, ErrorCode::ConfigError);

        let mut config = AppConfig::new();
        config.sampling.num_inference_steps = 1001;
        assert!(config.validate().is_err());

        // Step count is irrelevant to ancestral sampling
        config.sampling.sampler = "ddpm".to_string();
        assert!(config.validate().is_ok());

        let mut config = AppConfig::new();
        config.sampling.eta = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::new();
        config.diffusion.timesteps = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::new();
        config.sampling.img_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let config = AppConfig::new().with_overrides(lookup(&[
            ("DIT_TIMESTEPS", "200"),
            ("DIT_BETA_SCHEDULE", "LINEAR"),
            ("DIT_BETA_START", "0.001"),
            ("DIT_BETA_END", "0.05"),
            ("DIT_SAMPLER", "DDPM"),
            ("DIT_STEPS", "20"),
            ("DIT_ETA", "0.5"),
            ("DIT_SEED", "7"),
            ("DIT_OUTPUT_DIR", "/tmp/out"),
        ]));
        assert_eq!(config.diffusion.timesteps, 200);
        assert_eq!(config.diffusion.beta_schedule, "linear");
        assert_eq!(config.diffusion.beta_start, 0.001);
        assert_eq!(config.diffusion.beta_end, 0.05);
        assert_eq!(config.sampling.sampler, "ddpm");
        assert_eq!(config.sampling.num_inference_steps, 20);
        assert_eq!(config.sampling.eta, 0.5);
        assert_eq!(config.sampling.seed, 7);
        assert_eq!(config.effective_output_dir(), PathBuf::from("/tmp/out"));
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let config = AppConfig::new().with_overrides(lookup(&[
            ("DIT_TIMESTEPS", "0"),
            ("DIT_BETA_SCHEDULE", "sigmoid"),
            ("DIT_SAMPLER", "euler"),
            ("DIT_STEPS", "many"),
            ("DIT_ETA", "2.0"),
            ("DIT_SEED", "-1"),
        ]));
        assert_eq!(config, AppConfig::new());
    }

    #[test]
    fn from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"diffusion": {"timesteps": 500}, "sampling": {"sampler": "ddpm"}}"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.diffusion.timesteps, 500);
        assert_eq!(config.diffusion.beta_schedule, "cosine");
        assert_eq!(config.sampling.sampler, "ddpm");
        assert_eq!(config.sampling.seed, 42);
        assert!(config.output_dir.is_none());
    }

    #[test]
    fn from_file_errors() {
        let dir = tempdir().unwrap();
        let err = AppConfig::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code, ErrorCode::IoError);

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn effective_output_dir_default() {
        let config = AppConfig::new();
        let path = config.effective_output_dir();
        assert!(!path.as_os_str().is_empty());
        assert!(path.ends_with("samples"));
    }
}
