//! rastercache CLI - Command-line interface
//!
//! Drives the rastercache library with a synthetic image workload and
//! manages its configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;
use runner::CliRunner;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rastercache")]
#[command(version = rastercache::VERSION)]
#[command(about = "Concurrency substrate for image transformation caches", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synthetic concurrent workload and report cache behaviour
    Simulate(SimulateArgs),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Simulate(args) => {
            let runner = CliRunner::new(cli.config.as_deref(), cli.verbose)?;
            commands::simulate::run(args, runner.config())
        }
        Commands::Config(command) => commands::config::run(command, cli.config.as_deref()),
    }
}
