//! cadledger CLI
//!
//! Runs edit scripts against an in-memory cadledger session.
//!
//! # Commands
//!
//! - `run` - Execute a JSON edit script, optionally dumping the final model
//! - `demo` - Walk through the destroy/undo/redo associativity scenario
//! - `version` - Show version information

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// cadledger command-line tools.
#[derive(Parser)]
#[command(name = "cadledger")]
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
    /// Execute a JSON edit script
    Run {
        /// Path to the script
        script: PathBuf,

        /// Session configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Prepare commands on the worker pool
        #[arg(short, long)]
        pooled: bool,

        /// Print the live model after the last step
        #[arg(short, long)]
        dump: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the built-in associativity demo
    Demo,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
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
        Commands::Run {
            script,
            config,
            pooled,
            dump,
            format,
        } => {
            let options = commands::run::RunOptions {
                config,
                pooled,
                dump,
                format: format.parse()?,
            };
            commands::run::run(&script, &options)?;
        }
        Commands::Demo => {
            commands::demo::run()?;
        }
        Commands::Version => {
            println!("cadledger CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("cadledger Core v{}", cadledger_core::VERSION);
        }
    }

    Ok(())
}
