//! genotile CLI - Command-line interface
//!
//! Drives the genotile tile engine outside a browser: synthetic sessions
//! for exercising the cache, and config file management.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "genotile")]
#[command(version, about = "Multi-resolution tile cache for genome browser tracks", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.genotile/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic pan/zoom session and print cache statistics
    Simulate(SimulateArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args, config_path, cli.verbose),
        Commands::Config { command } => commands::config::run(command, config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
