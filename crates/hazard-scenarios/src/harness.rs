// Purpose: Runs a scenario under a wall-clock timeout and reports what it left behind.
//
// The scenario's `main` role runs on its own thread. If it has not returned
// when the timeout fires, the harness snapshots the profile's pending events
// and held locks, aborts the pending events, and leaves every stuck thread
// parked. Nothing is cancelled.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use hazard_sync::{HeldLock, PendingEvent, SyncProfile};
use tracing::{info, warn};

use crate::config::{HarnessConfig, OutputFormat};
use crate::error::{ScenarioError, ScenarioResult};
use crate::scenarios::{Expectation, Scenario, ScenarioReport};
use crate::topology::ScenarioContext;

/// Exit status of a timed-out run, as `timeout(1)` reports it.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub timeout: Duration,
    /// Record a sync profile during the run.
    pub profile: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            profile: true,
        }
    }
}

impl RunOptions {
    /// Options for running `scenario` under `config`.
    ///
    /// Race scenarios run unprofiled unless `profile_races` is set: every
    /// recorded event takes the profile's lock, which orders the raced
    /// accesses and hides the race.
    pub fn for_scenario(config: &HarnessConfig, scenario: &dyn Scenario) -> Self {
        let race = matches!(scenario.expectation(), Expectation::Race { .. });
        let profile = config.profile && (!race || config.profile_races);
        if config.profile && !profile {
            info!(scenario = scenario.name(), "race scenario runs without a profile");
        } else if race && profile {
            warn!(
                scenario = scenario.name(),
                "profiling a race scenario; the recorder may order the raced accesses"
            );
        }
        Self {
            timeout: config.timeout(),
            profile,
        }
    }
}

/// How a run ended.
#[derive(Debug)]
pub enum Outcome {
    Completed(ScenarioReport),
    TimedOut {
        /// Events that were still unfinished when the timeout fired.
        pending: Vec<PendingEvent>,
        /// Locks held at that moment.
        held: Vec<HeldLock>,
        aborted: usize,
    },
}

/// Whether a run matched its scenario's designed behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    AsDesigned,
    Unexpected(String),
}

/// Result of one harness run.
#[derive(Debug)]
pub struct Run {
    pub scenario: &'static str,
    pub expectation: Expectation,
    pub outcome: Outcome,
    pub elapsed: Duration,
    pub profile: SyncProfile,
}

impl Run {
    pub fn timed_out(&self) -> bool {
        matches!(self.outcome, Outcome::TimedOut { .. })
    }

    pub fn exit_code(&self) -> i32 {
        if self.timed_out() {
            TIMEOUT_EXIT_CODE
        } else {
            0
        }
    }

    pub fn verdict(&self) -> Verdict {
        match (&self.expectation, &self.outcome) {
            (Expectation::Terminates, Outcome::Completed(_)) => Verdict::AsDesigned,
            (Expectation::Race { variable, outcomes }, Outcome::Completed(report)) => match report.get(variable) {
                Some(value) if outcomes.iter().any(|o| *o == value) => Verdict::AsDesigned,
                other => Verdict::Unexpected(format!("`{}` ended as {:?}", variable, other)),
            },
            (Expectation::Deadlock | Expectation::Livelock, Outcome::TimedOut { .. }) => Verdict::AsDesigned,
            (Expectation::Deadlock | Expectation::Livelock, Outcome::Completed(_)) => {
                Verdict::Unexpected(format!("{} completed instead of hanging", self.scenario))
            }
            (_, Outcome::TimedOut { .. }) => {
                Verdict::Unexpected(format!("{} did not finish within {:?}", self.scenario, self.elapsed))
            }
        }
    }
}

/// Run `scenario` and wait at most `options.timeout` for it.
pub fn run_with_timeout(scenario: Arc<dyn Scenario>, options: &RunOptions) -> ScenarioResult<Run> {
    let profile = if options.profile {
        SyncProfile::new()
    } else {
        SyncProfile::disabled()
    };
    let ctx = ScenarioContext::with_profile(profile.clone());
    let name = scenario.name();
    let expectation = scenario.expectation();

    let (tx, rx) = bounded(1);
    let started = Instant::now();
    let runner = Arc::clone(&scenario);
    thread::Builder::new()
        .name("main".to_owned())
        .spawn(move || {
            // the receiver is gone only if the harness already gave up
            let _ = tx.send(runner.run(&ctx));
        })
        .map_err(|source| ScenarioError::Spawn {
            thread: "main".to_owned(),
            source,
        })?;
    info!(scenario = name, timeout = ?options.timeout, "running");

    let outcome = match rx.recv_timeout(options.timeout) {
        Ok(result) => Outcome::Completed(result?),
        Err(RecvTimeoutError::Timeout) => {
            let pending = profile.pending();
            let held = profile.held_locks();
            let aborted = profile.abort_pending();
            warn!(scenario = name, pending = pending.len(), held = held.len(), "timed out");
            Outcome::TimedOut { pending, held, aborted }
        }
        Err(RecvTimeoutError::Disconnected) => return Err(ScenarioError::ThreadPanicked("main".to_owned())),
    };

    let run = Run {
        scenario: name,
        expectation,
        outcome,
        elapsed: started.elapsed(),
        profile,
    };
    info!(scenario = name, elapsed = ?run.elapsed, verdict = ?run.verdict(), "finished");
    Ok(run)
}

/// Human-readable account of a run: result line, then whatever was stuck.
pub fn describe(run: &Run) -> String {
    let mut out = String::new();
    match &run.outcome {
        Outcome::Completed(report) => {
            out.push_str(&format!("{}: completed in {:?}\n", run.scenario, run.elapsed));
            for (name, value) in &report.values {
                out.push_str(&format!("  {} = {}\n", name, value));
            }
        }
        Outcome::TimedOut { pending, held, aborted } => {
            out.push_str(&format!(
                "{}: timed out after {:?} ({} event(s) aborted)\n",
                run.scenario, run.elapsed, aborted
            ));
            for event in pending {
                out.push_str(&format!("  {} blocked in {} on {}\n", event.thread, event.op.name(), event.object));
            }
            for lock in held {
                out.push_str(&format!("  {} holds {}\n", lock.thread, lock.lock));
            }
        }
    }
    match run.verdict() {
        Verdict::AsDesigned => out.push_str(&format!("  behaved as designed ({})\n", run.expectation)),
        Verdict::Unexpected(why) => out.push_str(&format!("  UNEXPECTED: {}\n", why)),
    }
    out
}

/// Where a rendered profile goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSink {
    File(PathBuf),
    /// Keeps stdout for the scenario's own output.
    Stderr,
}

impl ProfileSink {
    pub fn from_output(output: Option<&Path>) -> Self {
        match output {
            Some(path) => ProfileSink::File(path.to_path_buf()),
            None => ProfileSink::Stderr,
        }
    }
}

/// Render `profile` as `format`.
pub fn render_profile(profile: &SyncProfile, format: OutputFormat) -> ScenarioResult<String> {
    Ok(match format {
        OutputFormat::Text => profile.render_text(),
        OutputFormat::Chrome => serde_json::to_string_pretty(&profile.chrome_trace())?,
    })
}

/// Render `profile` as `format` into `output`, or to stderr when no path is given.
pub fn write_profile(profile: &SyncProfile, format: OutputFormat, output: Option<&Path>) -> ScenarioResult<()> {
    let rendered = render_profile(profile, format)?;
    match ProfileSink::from_output(output) {
        ProfileSink::File(path) => {
            fs::write(&path, rendered)?;
            info!(path = %path.display(), "profile written");
        }
        ProfileSink::Stderr => {
            let mut stderr = io::stderr().lock();
            stderr.write_all(rendered.as_bytes())?;
            stderr.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::{DeadlockSem, SignaledHandoff, WeirdThreadGraph};

    #[test]
    fn test_terminating_scenario_completes() {
        let run = run_with_timeout(Arc::new(SignaledHandoff), &RunOptions::default()).unwrap();
        assert!(!run.timed_out());
        assert_eq!(run.exit_code(), 0);
        assert_eq!(run.verdict(), Verdict::AsDesigned);
        assert!(describe(&run).contains("b = 4"));
    }

    #[test]
    fn test_hanging_scenario_times_out() {
        let options = RunOptions {
            timeout: Duration::from_millis(300),
            profile: true,
        };
        let run = run_with_timeout(Arc::new(DeadlockSem), &options).unwrap();
        assert_eq!(run.exit_code(), TIMEOUT_EXIT_CODE);
        assert_eq!(run.verdict(), Verdict::AsDesigned);
        assert!(run.profile.marks().iter().any(|m| m.name == "Event(s) aborted"));
    }

    #[test]
    fn test_profile_is_written_to_file() {
        let run = run_with_timeout(Arc::new(SignaledHandoff), &RunOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.json");
        write_profile(&run.profile, OutputFormat::Chrome, Some(&path)).unwrap();

        let trace: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(trace["traceEvents"].as_array().is_some_and(|events| !events.is_empty()));
    }

    #[test]
    fn test_race_scenarios_run_unprofiled_by_default() {
        let config = HarnessConfig::default();
        assert!(!RunOptions::for_scenario(&config, &WeirdThreadGraph).profile);
        assert!(RunOptions::for_scenario(&config, &SignaledHandoff).profile);

        let opted_in = HarnessConfig {
            profile_races: true,
            ..HarnessConfig::default()
        };
        assert!(RunOptions::for_scenario(&opted_in, &WeirdThreadGraph).profile);

        let off = HarnessConfig {
            profile: false,
            profile_races: true,
            ..HarnessConfig::default()
        };
        assert!(!RunOptions::for_scenario(&off, &WeirdThreadGraph).profile);
    }

    #[test]
    fn test_profile_without_output_goes_to_stderr() {
        assert_eq!(ProfileSink::from_output(None), ProfileSink::Stderr);
        let path = Path::new("trace.json");
        assert_eq!(ProfileSink::from_output(Some(path)), ProfileSink::File(path.to_path_buf()));
    }
}
