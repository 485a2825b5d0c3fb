//! transport CLI - Monte Carlo particle-transport runner
//!
//! Operational entry point for the transport engine.
//!
//! # Commands
//!
//! - `transport run` - Run the slab demonstration problem
//! - `transport check` - Check the runtime configuration
//!
//! While a run is in progress the process reads single-letter commands
//! from stdin: `s` prints a status report, `e` ends the run after the
//! in-flight histories, and `k` kills the process immediately.

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;

pub use error::{CliError, Result};

/// Monte Carlo particle-transport engine CLI
#[derive(Parser)]
#[command(name = "transport")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the slab demonstration problem
    Run {
        /// Number of histories to simulate
        #[arg(short = 'n', long, default_value = "100000")]
        histories: u64,

        /// Worker threads (default: all cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Base random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Wall-time limit in seconds
        #[arg(short, long)]
        wall_time: Option<f64>,

        /// TOML properties file overriding the flags above
        #[arg(short, long)]
        properties: Option<String>,

        /// Read interactive commands (s/e/k) from stdin while running
        #[arg(short, long)]
        interactive: bool,
    },

    /// Check the runtime configuration
    Check,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Run {
            histories,
            threads,
            seed,
            wall_time,
            properties,
            interactive,
        } => commands::run::run(
            histories,
            threads,
            seed,
            wall_time,
            properties.as_deref(),
            interactive,
        ),
        Commands::Check => commands::check::run(),
    }
}
