//! dit-diffusion: inspect noise schedules and sample image batches.
//!
//! - `schedule`: Print the configured noise schedule
//! - `sample`: Run DDPM or DDIM sampling against the Gaussian-prior predictor

use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dit_diffusion::cli::{Cli, Command, SampleArgs};
use dit_diffusion::config::AppConfig;
use dit_diffusion::generation::{GenerationRequest, Generator};
use dit_diffusion::numeric::mean_std;
use dit_diffusion::output::{normalize_images, write_samples};
use dit_diffusion::sampling::GaussianPriorPredictor;
use dit_diffusion::schedule::build;

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::default(),
    }
    .with_env_overrides();

    match &cli.command {
        Command::Schedule { json } => run_schedule(&config, *json),
        Command::Sample(args) => run_sample(config, args),
    }
}

/// Full schedule dump for `schedule --json`.
#[derive(Serialize)]
struct ScheduleReport<'a> {
    kind: &'a str,
    timesteps: usize,
    fingerprint: String,
    betas: &'a [f64],
    alphas: &'a [f64],
    alphas_cumprod: &'a [f64],
}

fn run_schedule(config: &AppConfig, json: bool) -> Result<()> {
    let schedule = build(&config.diffusion).context("building noise schedule")?;
    let last = schedule.len() - 1;

    if json {
        let report = ScheduleReport {
            kind: schedule.kind().as_str(),
            timesteps: schedule.len(),
            fingerprint: config.diffusion.fingerprint(),
            betas: schedule.betas(),
            alphas: schedule.alphas(),
            alphas_cumprod: schedule.alphas_cumprod(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let snr = schedule.snr();
    println!("Schedule:     {}", schedule.kind());
    println!("Timesteps:    {}", schedule.len());
    println!("Fingerprint:  {}", config.diffusion.fingerprint());
    println!("beta:         {:.6e} .. {:.6e}", schedule.beta(0), schedule.beta(last));
    println!(
        "alpha_bar:    {:.6} .. {:.6e}",
        schedule.alpha_cumprod(0),
        schedule.alpha_cumprod(last)
    );
    println!("SNR:          {:.4e} .. {:.4e}", snr[0], snr[last]);
    Ok(())
}

fn run_sample(mut config: AppConfig, args: &SampleArgs) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;

    let request = GenerationRequest::from_config(&config)?;
    let output_path = args.output_path(&config);

    let generator = Generator::new();
    let schedule = generator.schedule(&request.diffusion)?;
    let mut predictor = GaussianPriorPredictor::new(schedule, 0.0, args.prior_std)?;

    let start = Instant::now();
    let mut batch = generator.generate(&request, &mut predictor, |step, total| {
        if step % 10 == 0 || step == total {
            info!("Progress: {}/{} steps", step, total);
        }
    })?;
    let elapsed = start.elapsed().as_secs_f32();

    let images = batch.to_array()?;
    let (mean, std) = mean_std(&images);
    if args.normalize {
        batch.data = normalize_images(&images).iter().copied().collect();
    }

    write_samples(&batch, &output_path)
        .with_context(|| format!("writing samples to {}", output_path.display()))?;

    println!("Sampler:  {}", batch.sampler);
    println!("Shape:    {}", batch.shape);
    println!("Seed:     {}", batch.seed);
    println!("Time:     {:.2}s", elapsed);
    println!("Mean/std: {:.4} / {:.4} (prior std {})", mean, std, args.prior_std);
    println!("Saved to: {}", output_path.display());
    Ok(())
}
