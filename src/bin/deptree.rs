//! Command-line runner for scenarios
//!
//! ```text
//! deptree read.Conllu tutorial.ToPositions write.Conllu -- in.conllu
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use deptree::scenario::{Scenario, ScenarioError, join_args, parse_scenario};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Run a scenario of processing blocks over CoNLL-U dependency trees
#[derive(Parser, Debug)]
#[command(name = "deptree")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Print the parsed scenario and exit
    #[arg(long)]
    dump_scenario: bool,

    /// Blocks, each followed by its key=value parameters
    #[arg(required = true)]
    scenario: Vec<String>,

    /// Input files for reader blocks that have no files= parameter
    #[arg(last = true)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), ScenarioError> {
    let specs = parse_scenario(&join_args(&cli.scenario))?;
    if cli.dump_scenario {
        for spec in &specs {
            println!("{}", spec);
        }
        return Ok(());
    }

    let mut scenario = Scenario::from_specs(&specs, &cli.files)?;
    let documents = scenario.run()?;
    debug!(documents, "scenario finished");
    Ok(())
}
