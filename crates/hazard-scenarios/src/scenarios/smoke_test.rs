// Purpose: N workers contend for one lock around a shared counter.

use std::sync::Arc;

use hazard_sync::{Discipline, Lock, SharedVariable};

use super::{Expectation, Scenario, ScenarioReport};
use crate::config::SmokeConfig;
use crate::error::ScenarioResult;
use crate::topology::ScenarioContext;

#[derive(Debug, Clone)]
pub struct SmokeTest {
    threads: usize,
    iterations: u32,
}

impl Default for SmokeTest {
    fn default() -> Self {
        Self::from_config(&SmokeConfig::default())
    }
}

impl SmokeTest {
    pub fn from_config(config: &SmokeConfig) -> Self {
        Self {
            threads: config.threads,
            iterations: config.iterations,
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Counter value after every worker finished.
    pub fn expected_total(&self) -> u64 {
        self.threads as u64 * u64::from(self.iterations)
    }
}

fn contend(tid: usize, iterations: u32, m: &Lock, shared_var: &SharedVariable<u32>) -> ScenarioResult<()> {
    for i in 0..iterations {
        m.acquire();
        let value = shared_var.load_locked(m)?;
        eprintln!("i={} thread #{} shared_var={}", i, tid, value);
        shared_var.store_locked(m, value.wrapping_add(1))?;
        m.release()?;
    }
    Ok(())
}

impl Scenario for SmokeTest {
    fn name(&self) -> &'static str {
        "smoke_test"
    }

    fn description(&self) -> &'static str {
        "lock contention between worker threads around a shared counter"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Terminates
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        let m = ctx.lock("m");
        let shared_var = ctx.shared("shared_var", 0u32, Discipline::LockGuarded(m.name().to_owned()));

        let mut workers = Vec::with_capacity(self.threads);
        for tid in 0..self.threads {
            println!("In main: creating thread {}", tid);
            let m = Arc::clone(&m);
            let shared_var = Arc::clone(&shared_var);
            let iterations = self.iterations;
            workers.push(ctx.spawn(&format!("worker{}", tid), move || {
                contend(tid, iterations, &m, &shared_var)
            })?);
        }
        for worker in workers {
            ctx.join_role(worker)?;
        }

        // SAFETY: every worker has been joined
        let total = unsafe { shared_var.load() };
        Ok(ScenarioReport::default()
            .value("shared_var", total)
            .value("threads", self.threads))
    }
}
