// Purpose: Two roles poll for each other's lock while holding their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hazard_sync::Discipline;
use tracing::info;

use super::{Expectation, Scenario, ScenarioReport};
use crate::config::LivelockConfig;
use crate::error::ScenarioResult;
use crate::protocol::{AcquisitionOrder, PairRole, Role, RoleOutcome, SecondAcquire};
use crate::topology::ScenarioContext;

/// Failed try-acquire counts of both roles.
///
/// Shared with whoever built the scenario, so a harness can watch the counts
/// grow while the run itself never returns.
#[derive(Debug, Clone, Default)]
pub struct AttemptCounters {
    first: Arc<AtomicU64>,
    second: Arc<AtomicU64>,
}

impl AttemptCounters {
    fn for_role(&self, role: Role) -> Arc<AtomicU64> {
        match role {
            Role::First => Arc::clone(&self.first),
            Role::Second => Arc::clone(&self.second),
        }
    }

    fn reset(&self) {
        self.first.store(0, Ordering::Relaxed);
        self.second.store(0, Ordering::Relaxed);
    }

    /// `(first, second)` failed attempts so far.
    pub fn snapshot(&self) -> (u64, u64) {
        (self.first.load(Ordering::Relaxed), self.second.load(Ordering::Relaxed))
    }
}

/// Reverse-order acquisition where the second lock is polled with a backoff.
#[derive(Debug, Clone)]
pub struct Livelock {
    backoff: Duration,
    attempt_limit: Option<u64>,
    attempts: AttemptCounters,
}

impl Default for Livelock {
    fn default() -> Self {
        Self::from_config(&LivelockConfig::default())
    }
}

impl Livelock {
    pub fn from_config(config: &LivelockConfig) -> Self {
        Self {
            backoff: config.backoff(),
            attempt_limit: config.attempt_limit,
            attempts: AttemptCounters::default(),
        }
    }

    pub fn attempts(&self) -> AttemptCounters {
        self.attempts.clone()
    }
}

impl Scenario for Livelock {
    fn name(&self) -> &'static str {
        "livelock"
    }

    fn description(&self) -> &'static str {
        "livelock from reverse-order try-acquire polling with backoff"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Livelock
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        self.attempts.reset();
        let m1 = ctx.lock("m1");
        let m2 = ctx.lock("m2");
        let rendezvous = ctx.barrier("b", 2)?;
        let shared_var = ctx.shared("shared_var", 0u32, Discipline::Unguarded);

        let mut workers = Vec::new();
        for role in [Role::First, Role::Second] {
            let pair = PairRole {
                role,
                order: AcquisitionOrder::for_role(role, &m1, &m2),
                rendezvous: Arc::clone(&rendezvous),
                shared_var: Arc::clone(&shared_var),
                second: SecondAcquire::Polling {
                    backoff: self.backoff,
                    attempt_limit: self.attempt_limit,
                    attempts: self.attempts.for_role(role),
                },
            };
            workers.push(ctx.spawn(role.thread_name(), move || pair.run())?);
        }

        let mut report = ScenarioReport::default();
        for worker in workers {
            let name = worker.name().to_owned();
            match ctx.join(worker)?? {
                RoleOutcome::Entered { shared_var } => report = report.value(&name, shared_var),
                RoleOutcome::Starved { attempts } => {
                    info!(role = %name, attempts, "role starved");
                    report = report.value(&name, format!("starved after {} attempts", attempts));
                }
            }
        }
        // SAFETY: both roles have been joined
        let last = unsafe { shared_var.load() };
        Ok(report.value("shared_var", last))
    }
}
