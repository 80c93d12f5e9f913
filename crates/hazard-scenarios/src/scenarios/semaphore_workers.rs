// Purpose: Two workers driven in lockstep by a runner through start/done semaphores.
//
// One semaphore (initially 1) serves as the mutex around the shared write;
// the others only signal between threads. The runner loops forever and is
// never joined; once both workers are done it stays parked on a done
// semaphore.

use std::sync::Arc;

use hazard_sync::{Discipline, Semaphore, SharedVariable};
use tracing::debug;

use super::{Expectation, Scenario, ScenarioReport};
use crate::config::LockstepConfig;
use crate::error::ScenarioResult;
use crate::topology::ScenarioContext;

/// Name of the semaphore guarding `shared`.
pub const CRITICAL_SECTION: &str = "critical_section_sem";

#[derive(Debug, Clone)]
pub struct SemaphoreWorkers {
    iterations: u32,
}

impl Default for SemaphoreWorkers {
    fn default() -> Self {
        Self::from_config(&LockstepConfig::default())
    }
}

impl SemaphoreWorkers {
    pub fn from_config(config: &LockstepConfig) -> Self {
        Self {
            iterations: config.iterations,
        }
    }
}

struct Worker {
    offset: u32,
    iterations: u32,
    start: Arc<Semaphore>,
    done: Arc<Semaphore>,
    critical: Arc<Semaphore>,
    shared: Arc<SharedVariable<u32>>,
}

impl Worker {
    fn run(&self) -> ScenarioResult<()> {
        for round in 0..self.iterations {
            self.start.wait();
            self.critical.wait();
            // SAFETY: inside critical_section_sem
            unsafe { self.shared.store(self.offset) };
            self.critical.post()?;
            self.done.post()?;
            debug!(offset = self.offset, round, "round done");
        }
        Ok(())
    }
}

struct Runner {
    workers: [(Arc<Semaphore>, Arc<Semaphore>); 2],
}

impl Runner {
    fn run(&self) -> ScenarioResult<()> {
        let [(start1, done1), (start2, done2)] = &self.workers;
        loop {
            start1.post()?;
            start2.post()?;
            done1.wait();
            done2.wait();
        }
    }
}

impl Scenario for SemaphoreWorkers {
    fn name(&self) -> &'static str {
        "semaphore_workers"
    }

    fn description(&self) -> &'static str {
        "two workers in lockstep, mixing mutex and signalling semaphores; no race"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Terminates
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        let critical = ctx.semaphore(CRITICAL_SECTION, 1);
        let shared = ctx.shared("shared", 0u32, Discipline::SemaphoreGuarded(CRITICAL_SECTION.to_owned()));
        let start1 = ctx.semaphore("start_sem1", 0);
        let start2 = ctx.semaphore("start_sem2", 0);
        let done1 = ctx.semaphore("done_sem1", 0);
        let done2 = ctx.semaphore("done_sem2", 0);

        let mut workers = Vec::new();
        for (offset, start, done) in [(0, &start1, &done1), (1, &start2, &done2)] {
            let worker = Worker {
                offset,
                iterations: self.iterations,
                start: Arc::clone(start),
                done: Arc::clone(done),
                critical: Arc::clone(&critical),
                shared: Arc::clone(&shared),
            };
            workers.push(ctx.spawn(&format!("worker{}", offset + 1), move || worker.run())?);
        }
        let runner = Runner {
            workers: [(start1, done1), (start2, done2)],
        };
        let runner = ctx.spawn("runner", move || runner.run())?;

        for worker in workers {
            ctx.join_role(worker)?;
        }
        ctx.detach(runner);

        // SAFETY: both writers have been joined; the runner never touches `shared`
        let last = unsafe { shared.load() };
        Ok(ScenarioReport::default()
            .value("shared", last)
            .value("rounds", self.iterations))
    }
}
