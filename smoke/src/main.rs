//! Smoke tests for infrastructure tooling and terraform configurations.
//!
//! `smoke tools` checks that the external binaries are installed and answer.
//! `smoke run` applies each scenario's configuration, runs its checks, and
//! destroys it again, recording results under `.smoke/results/`.

mod checks;
mod cli;
mod outcome;
mod report;
mod results;
mod run;
mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harness::exit_codes;
use harness::io::config::{CONFIG_FILE, load_config};

use crate::run::RunOptions;

#[derive(Parser)]
#[command(
    name = "smoke",
    version,
    about = "Smoke tests for infrastructure tooling and terraform configurations"
)]
struct Cli {
    /// Config file (default: `smoke.toml` in the working directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that terraform, gpg, talosctl, and flux run and print output.
    Tools,
    /// Print scenario ids.
    List,
    /// Apply, check, and destroy a scenario.
    Run {
        #[arg(required_unless_present = "all")]
        scenario_id: Option<String>,
        /// Run every scenario.
        #[arg(long, conflicts_with = "scenario_id")]
        all: bool,
        /// Leave the infrastructure up after the run.
        #[arg(long)]
        keep: bool,
    },
    /// Destroy a scenario's infrastructure.
    Destroy { scenario_id: String },
    /// Summarize recorded runs of a scenario.
    Report { scenario_id: String },
    /// Delete recorded runs of a scenario.
    Clean { scenario_id: String },
}

fn main() {
    if let Err(err) = harness::logging::init() {
        eprintln!("{:#}", err);
    }
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    let config_path = cli.config.unwrap_or_else(|| root.join(CONFIG_FILE));
    let config = load_config(&config_path)?;

    match cli.command {
        Command::Tools => cli::check_tools(&config),
        Command::List => cli::list_scenarios(&root, &config),
        Command::Run {
            scenario_id,
            all: _,
            keep,
        } => cli::run_scenarios(
            &root,
            &config,
            scenario_id.as_deref(),
            RunOptions { keep },
        ),
        Command::Destroy { scenario_id } => cli::destroy_scenario(&root, &config, &scenario_id),
        Command::Report { scenario_id } => cli::report_scenario(&root, &config, &scenario_id),
        Command::Clean { scenario_id } => cli::clean_scenario(&root, &config, &scenario_id),
    }
}
