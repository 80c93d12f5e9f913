// Purpose: Provides the entry point for the hazard harness CLI.

use clap::Parser;
use hazard_scenarios::cli::{self, Cli};
use hazard_scenarios::logging;

fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let code = cli::run(Cli::parse())?;
    // stuck scenario threads are still parked; exiting the process ends them
    std::process::exit(code)
}
