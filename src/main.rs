use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, WrapErr};
use rayon::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::FormatTime;

use proto_stress::driver::{self, Generated};
use proto_stress::manifest::{Manifest, RunSummary};
use proto_stress::profile::{self, GenerationMode};
use proto_stress::{Catalog, GenResult, lift, resolver};

/// A timer that outputs nothing but still enables span timing calculation
struct NoTimestamp;

impl FormatTime for NoTimestamp {
    fn format_time(
        &self,
        _w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> std::fmt::Result {
        Ok(())
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Aggressive,
    Conservative,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Aggressive => GenerationMode::Aggressive,
            ModeArg::Conservative => GenerationMode::Conservative,
        }
    }
}

#[derive(Parser)]
#[command(name = "proto-stress")]
#[command(about = "Generate random script programs for engine fuzzing")]
struct Cli {
    /// Embedded generation profile
    #[arg(long, default_value = "default")]
    profile: String,

    /// Load the profile from a TOML file instead
    #[arg(long, conflicts_with = "profile")]
    profile_file: Option<PathBuf>,

    /// Base seed; program `i` uses `seed + i`
    #[arg(long)]
    seed: Option<u64>,

    /// Number of programs to generate
    #[arg(long, default_value = "10")]
    count: usize,

    /// Output directory
    #[arg(long, default_value = "/tmp/proto-stress")]
    output: PathBuf,

    /// Worker threads (default: one per core)
    #[arg(long)]
    jobs: Option<usize>,

    /// Override the profile's generation mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Override the profile's recursion budget
    #[arg(long)]
    budget: Option<usize>,
}

fn init_tracing() {
    // PROTO_STRESS_LOG_STYLE: "compact" (default) or "full" (with timestamps)
    if let Ok(filter) = EnvFilter::try_from_env("PROTO_STRESS_LOG") {
        let style = std::env::var("PROTO_STRESS_LOG_STYLE").unwrap_or_default();
        if style == "full" {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_level(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_writer(std::io::stderr)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_level(true)
                .with_timer(NoTimestamp)
                .with_writer(std::io::stderr)
                .init();
        }
        tracing::debug!("tracing initialized");
    }
}

fn main() -> miette::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let seed = cli.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });

    let (profile_name, mut profile) = match &cli.profile_file {
        Some(path) => (path.display().to_string(), profile::load_profile(path)?),
        None => (cli.profile.clone(), profile::get_profile(&cli.profile)?),
    };
    if let Some(mode) = cli.mode {
        profile.generation.mode = mode.into();
    }
    if let Some(budget) = cli.budget {
        profile.generation.recursion_budget = budget;
    }
    let config = profile.generation;

    let catalog = Catalog::standard()?;
    let params = resolver::resolve(&catalog, Some(&profile.rules));
    for name in &config.prefix {
        catalog.lookup(name)?;
    }

    fs::create_dir_all(&cli.output)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create '{}'", cli.output.display()))?;

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = cli.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool
        .build()
        .into_diagnostic()
        .wrap_err("failed to start worker threads")?;

    info!(seed, count = cli.count, profile = %profile_name, "generating");
    let results: Vec<GenResult<Generated>> = pool.install(|| {
        (0..cli.count)
            .into_par_iter()
            .map(|i| driver::generate(seed.wrapping_add(i as u64), &catalog, &params, &config))
            .collect()
    });

    let mut summary = RunSummary {
        requested: cli.count,
        ..RunSummary::default()
    };
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(generated) => {
                let path = cli.output.join(format!("program-{}.js", generated.seed));
                fs::write(&path, lift::lift(&generated.program))
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write '{}'", path.display()))?;
                summary.generated += 1;
                summary.stalled += usize::from(generated.stalled);
                summary.total_operations += generated.program.len();
                summary.deepest_nesting = summary.deepest_nesting.max(generated.deepest_nesting);
            }
            Err(err) => {
                error!(seed = seed.wrapping_add(i as u64), error = %err, "generation failed");
                summary.failed += 1;
            }
        }
    }

    let manifest = Manifest::new(seed, profile_name.clone(), config, summary.clone());
    manifest
        .write_to_dir(&cli.output)
        .into_diagnostic()
        .wrap_err("failed to write manifest")?;

    println!("proto-stress: Generated programs");
    println!("  seed:    {seed}");
    println!("  profile: {profile_name}");
    println!(
        "  programs: {} written, {} failed, {} stalled",
        summary.generated, summary.failed, summary.stalled
    );
    println!("  output:  {}", cli.output.display());

    Ok(())
}
