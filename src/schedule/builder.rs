//! Noise schedule construction.
//!
//! Derives the per-timestep coefficients of a variance-preserving Gaussian
//! diffusion from a [`DiffusionConfig`]. Coefficients are kept in `f64`; the
//! samplers narrow to `f32` only when scaling tensors.

use std::f64::consts::PI;

use tracing::debug;

use crate::error::{DiffusionError, Result};
use crate::types::DiffusionConfig;

/// Offset of the cosine schedule, keeps betas finite near t = 0.
pub const COSINE_OFFSET: f64 = 0.008;

/// Lower clip bound for cosine betas.
pub const MIN_COSINE_BETA: f64 = 1e-4;

/// Upper clip bound for cosine betas.
pub const MAX_COSINE_BETA: f64 = 0.9999;

/// Beta schedule family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BetaSchedule {
    /// Betas interpolated uniformly from beta_start to beta_end.
    Linear,
    /// Betas derived from a squared-cosine alpha_bar curve.
    #[default]
    Cosine,
}

impl BetaSchedule {
    /// Parses a beta schedule from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(BetaSchedule::Linear),
            "cosine" => Some(BetaSchedule::Cosine),
            _ => None,
        }
    }

    /// Returns the string name of this schedule.
    pub fn as_str(&self) -> &'static str {
        match self {
            BetaSchedule::Linear => "linear",
            BetaSchedule::Cosine => "cosine",
        }
    }
}

impl std::fmt::Display for BetaSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-timestep coefficients of the diffusion process.
///
/// Immutable once built. Share it behind an `Arc` between the forward
/// process and any number of concurrent sampling runs.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSchedule {
    kind: BetaSchedule,
    betas: Vec<f64>,
    alphas: Vec<f64>,
    alphas_cumprod: Vec<f64>,
}

impl NoiseSchedule {
    /// Creates a schedule from beta values and checks it is well-formed.
    pub fn from_betas(betas: Vec<f64>, kind: BetaSchedule) -> Result<Self> {
        if betas.is_empty() {
            return Err(DiffusionError::config("schedule needs at least one timestep"));
        }

        let alphas: Vec<f64> = betas.iter().map(|b| 1.0 - b).collect();

        let mut alphas_cumprod = Vec::with_capacity(alphas.len());
        let mut prod = 1.0;
        for &alpha in &alphas {
            prod *= alpha;
            alphas_cumprod.push(prod);
        }

        let schedule = Self {
            kind,
            betas,
            alphas,
            alphas_cumprod,
        };
        schedule.check_numerics()?;
        Ok(schedule)
    }

    fn check_numerics(&self) -> Result<()> {
        for (t, &beta) in self.betas.iter().enumerate() {
            if !beta.is_finite() || beta <= 0.0 || beta >= 1.0 {
                return Err(DiffusionError::numeric(format!(
                    "beta[{}] = {} is outside (0, 1)",
                    t, beta
                )));
            }
        }

        let mut prev = 1.0;
        for (t, &acp) in self.alphas_cumprod.iter().enumerate() {
            if !acp.is_finite() || acp <= 0.0 || acp > 1.0 {
                return Err(DiffusionError::numeric(format!(
                    "alphas_cumprod[{}] = {} is outside (0, 1]",
                    t, acp
                )));
            }
            if t > 0 && acp >= prev {
                return Err(DiffusionError::numeric(format!(
                    "alphas_cumprod not strictly decreasing at t = {}",
                    t
                )));
            }
            prev = acp;
        }

        Ok(())
    }

    /// Schedule family this schedule was built from.
    pub fn kind(&self) -> BetaSchedule {
        self.kind
    }

    /// Number of timesteps (T).
    pub fn len(&self) -> usize {
        self.betas.len()
    }

    /// Always false; a schedule has at least one timestep.
    pub fn is_empty(&self) -> bool {
        self.betas.is_empty()
    }

    pub fn betas(&self) -> &[f64] {
        &self.betas
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn alphas_cumprod(&self) -> &[f64] {
        &self.alphas_cumprod
    }

    /// Beta at timestep `t`. Panics if `t >= len()`.
    pub fn beta(&self, t: usize) -> f64 {
        self.betas[t]
    }

    /// Alpha at timestep `t`. Panics if `t >= len()`.
    pub fn alpha(&self, t: usize) -> f64 {
        self.alphas[t]
    }

    /// Cumulative alpha product at timestep `t`. Panics if `t >= len()`.
    pub fn alpha_cumprod(&self, t: usize) -> f64 {
        self.alphas_cumprod[t]
    }

    /// Cumulative alpha product at `t`, or 1.0 for the fully denoised state
    /// before timestep 0.
    pub fn alpha_cumprod_or_one(&self, t: Option<usize>) -> f64 {
        t.map_or(1.0, |t| self.alphas_cumprod[t])
    }

    /// Returns an error unless `t` is a valid timestep.
    pub fn check_timestep(&self, t: usize) -> Result<()> {
        if t < self.len() {
            Ok(())
        } else {
            Err(DiffusionError::timestep_out_of_range(t, self.len()))
        }
    }

    /// Signal-to-noise ratio `alpha_bar / (1 - alpha_bar)` at each timestep.
    pub fn snr(&self) -> Vec<f64> {
        self.alphas_cumprod
            .iter()
            .map(|a| a / (1.0 - a))
            .collect()
    }
}

/// Builds the noise schedule for `config`.
///
/// Unknown schedule names and violated config invariants fail with
/// `CONFIG_ERROR`; a schedule whose coefficients degenerate fails with
/// `NUMERIC_ERROR`.
pub fn build(config: &DiffusionConfig) -> Result<NoiseSchedule> {
    let kind = BetaSchedule::parse(&config.beta_schedule)
        .ok_or_else(|| DiffusionError::unknown_beta_schedule(&config.beta_schedule))?;

    if let Some(reason) = config.validate() {
        return Err(DiffusionError::config(reason));
    }

    let betas = match kind {
        BetaSchedule::Linear => linear_betas(config.timesteps, config.beta_start, config.beta_end),
        BetaSchedule::Cosine => cosine_betas(config.timesteps, COSINE_OFFSET),
    };

    let schedule = NoiseSchedule::from_betas(betas, kind)?;
    debug!(
        schedule = %kind,
        timesteps = schedule.len(),
        final_alpha_cumprod = schedule.alpha_cumprod(schedule.len() - 1),
        "built noise schedule"
    );
    Ok(schedule)
}

/// Uniformly interpolated betas. A single-step schedule is just `beta_start`.
fn linear_betas(timesteps: usize, beta_start: f64, beta_end: f64) -> Vec<f64> {
    if timesteps == 1 {
        return vec![beta_start];
    }
    let last = (timesteps - 1) as f64;
    (0..timesteps)
        .map(|t| beta_start + (beta_end - beta_start) * t as f64 / last)
        .collect()
}

/// Betas of the squared-cosine schedule, clipped to
/// `[MIN_COSINE_BETA, MAX_COSINE_BETA]`.
fn cosine_betas(timesteps: usize, s: f64) -> Vec<f64> {
    let total = timesteps as f64;
    let f = |i: usize| (((i as f64 / total) + s) / (1.0 + s) * PI * 0.5).cos().powi(2);

    let f0 = f(0);
    let alpha_bar: Vec<f64> = (0..=timesteps).map(|i| f(i) / f0).collect();

    alpha_bar
        .windows(2)
        .map(|w| (1.0 - w[1] / w[0]).clamp(MIN_COSINE_BETA, MAX_COSINE_BETA))
        .collect()
}
