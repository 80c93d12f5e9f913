// Purpose: End-to-end harness runs driven through the command line.

use std::fs;

use clap::Parser;
use hazard_scenarios::cli::{self, Cli};
use hazard_scenarios::harness::TIMEOUT_EXIT_CODE;
use hazard_scenarios::CorpusConfig;

#[test]
fn test_run_writes_chrome_profile_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("smoke.json");
    let cli = Cli::try_parse_from([
        "hazard",
        "run",
        "smoke_test",
        "--threads",
        "3",
        "--output-format",
        "chrome",
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(cli::run(cli).unwrap(), 0);

    let trace: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let events = trace["traceEvents"].as_array().unwrap();
    let creates = events
        .iter()
        .filter(|e| e["name"] == "thread_create" && e["ph"] == "B")
        .count();
    assert_eq!(creates, 3);
    for name in ["locked by m", "thread started", "thread finished"] {
        assert!(events.iter().any(|e| e["name"] == name), "missing {}", name);
    }
}

#[test]
fn test_deadlock_run_exits_like_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("hazard.toml");
    fs::write(&config, "[harness]\ntimeout_secs = 1\n").unwrap();
    let output = dir.path().join("deadlock.txt");

    let cli = Cli::try_parse_from([
        "hazard",
        "run",
        "deadlock_mutex",
        "--config",
        config.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(cli::run(cli).unwrap(), TIMEOUT_EXIT_CODE);

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("Synchronization point occurrences:"));
    assert!(text.contains("WARNING: Event(s) aborted"));
}

#[test]
fn test_unknown_scenario_is_an_error() {
    let cli = Cli::try_parse_from(["hazard", "run", "dining_philosophers"]).unwrap();
    let err = cli::run(cli).unwrap_err();
    assert!(format!("{:#}", err).contains("unknown scenario"));
}

#[test]
fn test_invalid_config_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("broken.toml");
    fs::write(&config, "[smoke]\nthreads = 0\n").unwrap();
    assert!(CorpusConfig::load(&config).is_err());

    let cli = Cli::try_parse_from(["hazard", "list", "--config", config.to_str().unwrap()]).unwrap();
    let err = cli::run(cli).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));
}
