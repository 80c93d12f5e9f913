// Purpose: Circular wait over two semaphores that nobody posts first.

use std::sync::Arc;

use hazard_sync::{Barrier, Discipline, Semaphore, SharedVariable};

use super::{Expectation, Scenario, ScenarioReport};
use crate::error::ScenarioResult;
use crate::protocol::{critical_section, Role};
use crate::topology::ScenarioContext;

/// A waits on `sem1` before posting `sem2`; B waits on `sem2` before posting `sem1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlockSem;

struct SemRole {
    role: Role,
    rendezvous: Arc<Barrier>,
    wait_on: Arc<Semaphore>,
    post_to: Arc<Semaphore>,
    shared_var: Arc<SharedVariable<u32>>,
}

impl SemRole {
    fn run(&self) -> ScenarioResult<u32> {
        self.rendezvous.arrive_and_wait();
        self.wait_on.wait();
        let value = critical_section(self.role.tid(), &self.shared_var);
        self.post_to.post()?;
        Ok(value)
    }
}

impl Scenario for DeadlockSem {
    fn name(&self) -> &'static str {
        "deadlock_sem"
    }

    fn description(&self) -> &'static str {
        "deadlock from two threads waiting on each other's semaphore"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Deadlock
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        let sem1 = ctx.semaphore("sem1", 0);
        let sem2 = ctx.semaphore("sem2", 0);
        let rendezvous = ctx.barrier("b", 2)?;
        let shared_var = ctx.shared("shared_var", 0u32, Discipline::Unguarded);

        let mut workers = Vec::new();
        for (role, wait_on, post_to) in [(Role::First, &sem1, &sem2), (Role::Second, &sem2, &sem1)] {
            let sem_role = SemRole {
                role,
                rendezvous: Arc::clone(&rendezvous),
                wait_on: Arc::clone(wait_on),
                post_to: Arc::clone(post_to),
                shared_var: Arc::clone(&shared_var),
            };
            workers.push(ctx.spawn(role.thread_name(), move || sem_role.run())?);
        }

        for worker in workers {
            ctx.join(worker)??;
        }
        // SAFETY: both roles have been joined
        let last = unsafe { shared_var.load() };
        Ok(ScenarioReport::default().value("shared_var", last))
    }
}
