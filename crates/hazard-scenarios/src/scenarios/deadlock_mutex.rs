// Purpose: Circular wait over two locks taken in opposite orders.

use std::sync::Arc;

use hazard_sync::Discipline;
use tracing::info;

use super::{Expectation, Scenario, ScenarioReport};
use crate::error::ScenarioResult;
use crate::protocol::{AcquisitionOrder, PairRole, Role, RoleOutcome, SecondAcquire};
use crate::topology::ScenarioContext;

/// A holds `m1` and blocks on `m2`; B holds `m2` and blocks on `m1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlockMutex;

impl Scenario for DeadlockMutex {
    fn name(&self) -> &'static str {
        "deadlock_mutex"
    }

    fn description(&self) -> &'static str {
        "deadlock from reverse-order acquisition of two locks"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Deadlock
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
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
                second: SecondAcquire::Blocking,
            };
            workers.push(ctx.spawn(role.thread_name(), move || pair.run())?);
        }

        let mut report = ScenarioReport::default();
        for worker in workers {
            let name = worker.name().to_owned();
            if let RoleOutcome::Entered { shared_var } = ctx.join(worker)?? {
                report = report.value(&name, shared_var);
            }
        }
        info!("both roles finished; the circular wait did not form");
        // SAFETY: both roles have been joined
        let last = unsafe { shared_var.load() };
        Ok(report.value("shared_var", last))
    }
}
