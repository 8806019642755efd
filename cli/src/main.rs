//! Trust Simulator CLI
//!
//! Runs trust simulations from a JSON config file or from population flags
//! and reports the outcome.

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trust_simulator_core_rs::orchestrator::{
    RunOutcome, Simulation, SimulationConfig, DEFAULT_STALL_THRESHOLD,
};
use trust_simulator_core_rs::population::{PopulationConfig, ValueDistribution};
use trust_simulator_core_rs::telemetry::TrustRecorder;

#[derive(Parser)]
#[command(name = "trust-sim")]
#[command(about = "Volunteer-computing trust and redundant-verification simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print its summary as JSON
    Run {
        /// Simulation config (JSON); population flags are ignored when set
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        population: PopulationArgs,

        /// Write tracked-node trust trajectories (JSON) to this file
        #[arg(long)]
        telemetry: Option<PathBuf>,

        /// Write the full event log (JSON) to this file
        #[arg(long)]
        events: Option<PathBuf>,

        /// Only log warnings and errors
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the simulation config generated from population flags
    Generate {
        #[command(flatten)]
        population: PopulationArgs,
    },
}

#[derive(Args)]
struct PopulationArgs {
    /// RNG seed
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Number of worker nodes
    #[arg(long, default_value = "100")]
    nodes: usize,

    /// Number of jobs in the backlog
    #[arg(long, default_value = "1000")]
    jobs: usize,

    /// Jobs active at start
    #[arg(long, default_value = "1")]
    active_jobs: usize,

    /// Node performance range (min,max)
    #[arg(long, value_delimiter = ',', default_value = "0.0,1.0")]
    performance: Vec<f64>,

    /// Job difficulty
    #[arg(long, default_value = "1.0")]
    difficulty: f64,

    /// Number of dishonest nodes
    #[arg(long, default_value = "0")]
    dishonest: usize,

    /// Probability that a dishonest node fabricates a result
    #[arg(long, default_value = "0.0")]
    false_ratio: f64,

    /// Number of nodes that retire
    #[arg(long, default_value = "0")]
    retiring: usize,

    /// Tick after which retiring nodes stop taking work
    #[arg(long, default_value = "0")]
    retire_after: u64,

    /// Node handles to record trust trajectories for (comma-separated)
    #[arg(long, value_delimiter = ',')]
    track: Vec<u32>,

    /// Idle ticks tolerated before the run counts as stalled
    #[arg(long, default_value_t = DEFAULT_STALL_THRESHOLD)]
    stall_threshold: u64,
}

impl PopulationArgs {
    fn to_config(&self) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
        let (min, max) = match self.performance.as_slice() {
            [min, max] => (*min, *max),
            other => return Err(format!("expected two performance bounds, got {:?}", other).into()),
        };
        let performance = if min == max {
            ValueDistribution::Fixed { value: min }
        } else {
            ValueDistribution::Uniform { min, max }
        };

        let population = PopulationConfig {
            num_nodes: self.nodes,
            num_jobs: self.jobs,
            initial_active_jobs: self.active_jobs,
            performance,
            difficulty: ValueDistribution::Fixed {
                value: self.difficulty,
            },
            dishonest_nodes: self.dishonest,
            false_ratio: self.false_ratio,
            retiring_nodes: self.retiring,
            retire_after: self.retire_after,
            tracked_nodes: self.track.clone(),
            stall_threshold: self.stall_threshold,
        };
        Ok(population.generate(self.seed)?)
    }
}

fn load_config(path: &Path) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let config = serde_json::from_str(&raw)
        .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;
    Ok(config)
}

fn init_tracing(quiet: bool) {
    let default_filter = if quiet { "warn" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { population } => {
            // No tracing - output goes to stdout
            let config = population.to_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::Run {
            config,
            population,
            telemetry,
            events,
            quiet,
        } => {
            init_tracing(quiet);

            let config = match config {
                Some(path) => load_config(&path)?,
                None => population.to_config()?,
            };

            let mut sim = Simulation::with_sink(config, TrustRecorder::new())?;
            let outcome = sim.run()?;

            match &outcome {
                RunOutcome::Completed(summary) => info!(
                    final_tick = summary.final_tick,
                    results_sent = summary.results_sent,
                    "run completed"
                ),
                RunOutcome::Stalled(summary) => info!(
                    final_tick = summary.final_tick,
                    jobs_completed = summary.jobs_completed,
                    jobs_total = summary.jobs_total,
                    "run stalled"
                ),
            }

            if let Some(path) = events {
                fs::write(&path, serde_json::to_string(sim.event_log())?)?;
                info!(path = %path.display(), events = sim.event_log().len(), "event log written");
            }

            if let Some(path) = telemetry {
                let recorder = sim.sink();
                fs::write(&path, serde_json::to_string_pretty(recorder)?)?;
                info!(
                    path = %path.display(),
                    fingerprint = %recorder.fingerprint(),
                    "telemetry written"
                );
            }

            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
