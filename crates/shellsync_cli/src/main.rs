//! shellsync CLI
//!
//! Command-line tools for exercising the shellsync mirror.
//!
//! # Commands
//!
//! - `simulate` - Run a threaded mirror against a simulated engine
//! - `replay` - Replay a scripted delivery order step by step
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// shellsync reconciliation tools.
#[derive(Parser)]
#[command(name = "shellsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a threaded mirror against a simulated engine
    Simulate {
        /// Number of engine updates to generate
        #[arg(short, long, default_value = "500")]
        updates: u64,

        /// Seed for the delivery schedule
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Size of the windows shuffled independently (1 keeps order)
        #[arg(short, long, default_value = "4")]
        reorder_window: usize,

        /// Fraction of updates delivered twice
        #[arg(short, long, default_value = "0.1")]
        duplicate_rate: f64,

        /// Revision at which an account is created
        #[arg(long)]
        secret_at: Option<u64>,

        /// Number of snapshot pulls that fail before the engine recovers
        #[arg(long, default_value = "0")]
        failing_pulls: usize,

        /// Seconds to wait for convergence
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay a scripted delivery order
    Replay {
        /// Path to the JSON script
        script: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Simulate {
            updates,
            seed,
            reorder_window,
            duplicate_rate,
            secret_at,
            failing_pulls,
            timeout,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                updates,
                seed,
                reorder_window,
                duplicate_rate,
                secret_at,
                failing_pulls,
                timeout: std::time::Duration::from_secs(timeout),
            };
            commands::simulate::run(&options, &format)?;
        }
        Commands::Replay { script, format } => {
            commands::replay::run(&script, &format)?;
        }
        Commands::Version => {
            println!("shellsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("shellsync mirror v{}", shellsync_mirror::VERSION);
        }
    }

    Ok(())
}
