// Purpose: Provides the command-line interface of the scenario harness.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{CorpusConfig, OutputFormat};
use crate::harness::{self, Outcome, RunOptions};
use crate::logging;
use crate::scenarios::{self, Scenario};
use crate::topology::ScenarioContext;

/// Concurrency hazard scenario corpus
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "HAZARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the scenarios and their designed behavior
    List,

    /// Run a scenario under a timeout
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario name
    #[arg(required = true)]
    pub scenario: String,

    /// Seconds to wait before declaring the run stuck
    #[arg(long, env = "HAZARD_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Profile output format
    #[arg(long, value_enum, env = "HAZARD_OUTPUT_FORMAT")]
    pub output_format: Option<OutputFormat>,

    /// Write the profile here instead of stderr
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Worker count of the smoke scenario
    #[arg(long, env = "HAZARD_THREADS")]
    pub threads: Option<usize>,

    /// Do not record a profile
    #[arg(long, conflicts_with = "profile_races")]
    pub no_profile: bool,

    /// Record a profile for race scenarios too, at the cost of ordering
    /// their raced accesses
    #[arg(long)]
    pub profile_races: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of file configuration.
    pub fn apply(&self, config: &mut CorpusConfig) {
        if let Some(timeout) = self.timeout {
            config.harness.timeout_secs = timeout;
        }
        if let Some(format) = self.output_format {
            config.harness.output_format = format;
        }
        if let Some(threads) = self.threads {
            config.smoke.threads = threads;
        }
        if self.no_profile {
            config.harness.profile = false;
        }
        if self.profile_races {
            config.harness.profile_races = true;
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<CorpusConfig> {
    match path {
        Some(path) => {
            CorpusConfig::load(path).with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(CorpusConfig::default()),
    }
}

/// Execute a parsed command line; returns the process exit status.
pub fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::List => {
            for scenario in scenarios::catalog(&config) {
                println!(
                    "{:<20} {:<28} {}",
                    scenario.name(),
                    scenario.expectation().to_string(),
                    scenario.description()
                );
            }
            Ok(0)
        }
        Command::Run(args) => {
            args.apply(&mut config);
            config.validate()?;
            let scenario = scenarios::by_name(&config, &args.scenario)?;
            let options = RunOptions::for_scenario(&config.harness, scenario.as_ref());
            let run = harness::run_with_timeout(scenario, &options)
                .with_context(|| format!("scenario {} failed", args.scenario))?;

            if let Outcome::Completed(report) = &run.outcome {
                if let Some(summary) = &report.summary {
                    println!("{}", summary);
                }
            }
            eprint!("{}", harness::describe(&run));
            if options.profile {
                harness::write_profile(&run.profile, config.harness.output_format, args.output.as_deref())?;
            }
            Ok(run.exit_code())
        }
    }
}

/// Entry point of the per-scenario executables: no arguments, no profile,
/// no timeout. Hanging scenarios never return from here.
pub fn run_standalone(name: &str) -> Result<()> {
    logging::init_tracing();
    let config = CorpusConfig::default();
    let scenario = scenarios::by_name(&config, name)?;
    run_scenario(scenario.as_ref())
}

fn run_scenario(scenario: &dyn Scenario) -> Result<()> {
    info!(scenario = scenario.name(), expectation = %scenario.expectation(), "starting");
    let report = scenario
        .run(&ScenarioContext::unprofiled())
        .with_context(|| format!("scenario {} failed", scenario.name()))?;
    if let Some(summary) = report.summary {
        println!("{}", summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags_override_config() {
        let cli = Cli::try_parse_from([
            "hazard",
            "run",
            "smoke_test",
            "--timeout",
            "5",
            "--threads",
            "3",
            "--output-format",
            "chrome",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = CorpusConfig::default();
        args.apply(&mut config);
        assert_eq!(config.harness.timeout_secs, 5);
        assert_eq!(config.smoke.threads, 3);
        assert_eq!(config.harness.output_format, OutputFormat::Chrome);
        assert!(!config.harness.profile_races);
    }

    #[test]
    fn test_profile_races_flag_opts_in() {
        let cli = Cli::try_parse_from(["hazard", "run", "weird_thread_graph", "--profile-races"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        let mut config = CorpusConfig::default();
        args.apply(&mut config);
        assert!(config.harness.profile_races);

        assert!(Cli::try_parse_from(["hazard", "run", "weird_thread_graph", "--profile-races", "--no-profile"]).is_err());
    }

    #[test]
    fn test_list_exits_zero() {
        let cli = Cli::try_parse_from(["hazard", "list"]).unwrap();
        assert_eq!(run(cli).unwrap(), 0);
    }
}
