//! Command-line interface.
//!
//! Flags left unset fall back to the config file and environment.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;
use crate::sampling::SamplerKind;

/// Available reverse samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SamplerArg {
    /// DDPM: ancestral sampling over every timestep
    Ddpm,
    /// DDIM: strided sampling, deterministic at eta = 0
    Ddim,
}

impl From<SamplerArg> for SamplerKind {
    fn from(arg: SamplerArg) -> Self {
        match arg {
            SamplerArg::Ddpm => SamplerKind::Ancestral,
            SamplerArg::Ddim => SamplerKind::Accelerated,
        }
    }
}

/// dit-diffusion: noise schedules and reverse sampling for image diffusion
#[derive(Parser, Debug)]
#[command(name = "dit-diffusion")]
#[command(about = "Gaussian diffusion schedules and DDPM/DDIM sampling")]
#[command(version)]
pub struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a summary of the configured noise schedule
    Schedule {
        /// Print the full coefficient arrays as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sample a batch with the Gaussian-prior reference predictor
    Sample(SampleArgs),
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct SampleArgs {
    /// Reverse sampler
    #[arg(long, value_enum)]
    pub sampler: Option<SamplerArg>,

    /// Number of images
    #[arg(short, long)]
    pub n: Option<usize>,

    /// Accelerated sampling steps (DDIM only)
    #[arg(long)]
    pub num_inference_steps: Option<usize>,

    /// Accelerated sampling stochasticity in [0, 1] (DDIM only)
    #[arg(long)]
    pub eta: Option<f32>,

    /// Random seed for reproducible sampling
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Image height and width
    #[arg(long)]
    pub img_size: Option<usize>,

    /// Channels per image
    #[arg(long)]
    pub channels: Option<usize>,

    /// Standard deviation of the zero-mean Gaussian data prior
    #[arg(long, default_value = "1.0")]
    pub prior_std: f32,

    /// Output JSON file (defaults to <output_dir>/samples-<seed>.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Rescale each image to [0, 1] before writing
    #[arg(long)]
    pub normalize: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl SampleArgs {
    /// Overrides `config` with every flag that was given.
    pub fn apply_to(&self, config: &mut AppConfig) {
        let sampling = &mut config.sampling;
        if let Some(sampler) = self.sampler {
            sampling.sampler = SamplerKind::from(sampler).as_str().to_string();
        }
        if let Some(n) = self.n {
            sampling.num_samples = n;
        }
        if let Some(steps) = self.num_inference_steps {
            sampling.num_inference_steps = steps;
        }
        if let Some(eta) = self.eta {
            sampling.eta = eta;
        }
        if let Some(seed) = self.seed {
            sampling.seed = seed;
        }
        if let Some(size) = self.img_size {
            sampling.img_size = size;
        }
        if let Some(channels) = self.channels {
            sampling.in_channels = channels;
        }
    }

    /// Returns the effective output path.
    pub fn output_path(&self, config: &AppConfig) -> PathBuf {
        self.out.clone().unwrap_or_else(|| {
            config
                .effective_output_dir()
                .join(format!("samples-{}.json", config.sampling.seed))
        })
    }
}
