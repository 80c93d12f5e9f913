//! Scenario Set
//!
//! Each scenario builds its shared state through a [`ScenarioContext`],
//! spawns its roles and joins them along the designed graph. Hazards are the
//! subject matter: a deadlocking scenario's `run` never returns.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::CorpusConfig;
use crate::error::{ScenarioError, ScenarioResult};
use crate::topology::ScenarioContext;

pub mod deadlock_mutex;
pub mod deadlock_sem;
pub mod livelock;
pub mod semaphore_workers;
pub mod signaled_handoff;
pub mod smoke_test;
pub mod weird_thread_graph;

pub use deadlock_mutex::DeadlockMutex;
pub use deadlock_sem::DeadlockSem;
pub use livelock::{AttemptCounters, Livelock};
pub use semaphore_workers::SemaphoreWorkers;
pub use signaled_handoff::SignaledHandoff;
pub use smoke_test::SmokeTest;
pub use weird_thread_graph::{Greeting, WeirdThreadGraph};

/// Designed behavior of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// Always terminates with a deterministic result.
    Terminates,
    /// Every thread ends up blocked; never terminates.
    Deadlock,
    /// Threads stay busy without progress.
    Livelock,
    /// Terminates with one of the listed values of `variable`.
    Race {
        variable: &'static str,
        outcomes: &'static [&'static str],
    },
}

impl Expectation {
    /// Whether a run of this scenario is supposed to return.
    pub fn terminates(&self) -> bool {
        matches!(self, Expectation::Terminates | Expectation::Race { .. })
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Terminates => write!(f, "terminates"),
            Expectation::Deadlock => write!(f, "deadlock"),
            Expectation::Livelock => write!(f, "livelock"),
            Expectation::Race { variable, outcomes } => {
                write!(f, "race on `{}` ({})", variable, outcomes.join(" | "))
            }
        }
    }
}

/// What a completed run observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Line the scenario's executable prints to stdout, if any.
    pub summary: Option<String>,
    /// Final values of the scenario's shared state, by name.
    pub values: BTreeMap<String, String>,
}

impl ScenarioReport {
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            values: BTreeMap::new(),
        }
    }

    pub fn value(mut self, name: &str, value: impl ToString) -> Self {
        self.values.insert(name.to_owned(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// A controlled multi-thread interaction.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn expectation(&self) -> Expectation;

    /// Run the scenario on the calling thread, which plays `main`.
    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport>;
}

/// Every scenario of the corpus, configured from `config`.
pub fn catalog(config: &CorpusConfig) -> Vec<Arc<dyn Scenario>> {
    vec![
        Arc::new(SignaledHandoff),
        Arc::new(DeadlockMutex),
        Arc::new(DeadlockSem),
        Arc::new(Livelock::from_config(&config.livelock)),
        Arc::new(SemaphoreWorkers::from_config(&config.lockstep)),
        Arc::new(WeirdThreadGraph),
        Arc::new(SmokeTest::from_config(&config.smoke)),
    ]
}

/// Look a scenario up by name.
pub fn by_name(config: &CorpusConfig, name: &str) -> ScenarioResult<Arc<dyn Scenario>> {
    catalog(config)
        .into_iter()
        .find(|scenario| scenario.name() == name)
        .ok_or_else(|| ScenarioError::UnknownScenario(name.to_owned()))
}
