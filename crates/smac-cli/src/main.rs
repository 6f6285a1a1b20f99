use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use smac_optimizer::{
    read_incumbent, select, ConfigMap, RunSeeds, ScenarioLayout, SearchSpace, SeedSpec,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "smac-multirun", about = "Multi-run SMAC helper", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a JSON search space as a SMAC .pcs file
    Pcs {
        /// Search space description (JSON)
        #[arg(long)]
        space: PathBuf,
    },
    /// Re-collect the global incumbent from a persisted working directory
    Collect {
        /// Working directory of a finished optimization
        #[arg(long)]
        working_dir: PathBuf,
        /// Search space description (JSON) used for that optimization
        #[arg(long)]
        space: PathBuf,
        /// Seed specification as JSON: null, an integer or a list
        #[arg(long, default_value = "null")]
        seed: String,
        /// Number of runs
        #[arg(long, default_value = "1")]
        runs: usize,
    },
}

#[derive(Debug, Serialize)]
struct Collected {
    cost: f64,
    config: ConfigMap,
    runs: usize,
    usable_runs: usize,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

fn load_space(path: &Path) -> anyhow::Result<SearchSpace> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading search space {}", path.display()))?;
    let space = serde_json::from_str(&text)
        .with_context(|| format!("parsing search space {}", path.display()))?;
    Ok(space)
}

fn collect(working_dir: &Path, space: &SearchSpace, seed: &str, runs: usize) -> anyhow::Result<Collected> {
    let seed_json: serde_json::Value =
        serde_json::from_str(seed).context("seed must be valid JSON")?;
    let seeds = RunSeeds::plan(&SeedSpec::try_from(&seed_json)?, runs)?;
    let decoders = space.encode()?.decoders;

    let layout = ScenarioLayout::new(working_dir);
    let scenario_name = layout.paths().scenario_name();
    let incumbents: Vec<_> = seeds
        .iter()
        .filter_map(|s| read_incumbent(&layout.out_dir, &scenario_name, s))
        .collect();
    let usable_runs = incumbents.len();
    info!("{} of {} runs have a trajectory", usable_runs, seeds.len());

    let (cost, config) = select(incumbents, seeds.len(), &decoders)?;
    Ok(Collected {
        cost,
        config,
        runs: seeds.len(),
        usable_runs,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging("warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Pcs { space } => {
            let encoded = load_space(&space)?.encode()?;
            println!("{}", encoded.pcs_text);
        }
        Commands::Collect {
            working_dir,
            space,
            seed,
            runs,
        } => {
            let space = load_space(&space)?;
            let collected = collect(&working_dir, &space, &seed, runs)?;
            println!("{}", serde_json::to_string_pretty(&collected)?);
        }
    }

    Ok(())
}
