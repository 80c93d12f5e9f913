// Purpose: Writer hands a value to a reader through a condition variable.

use std::sync::Arc;

use hazard_sync::{Barrier, ConditionVariable, Discipline, Lock, SharedVariable};
use tracing::debug;

use super::{Expectation, Scenario, ScenarioReport};
use crate::error::ScenarioResult;
use crate::topology::ScenarioContext;

/// Value the writer assigns.
pub const HANDOFF_VALUE: i32 = 4;

/// Correctly synchronized handoff; the reader always sees the written value.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignaledHandoff;

struct Handoff {
    lock: Arc<Lock>,
    cond_var: Arc<ConditionVariable>,
    barrier: Arc<Barrier>,
    a: Arc<SharedVariable<i32>>,
}

impl Handoff {
    fn writer(&self) -> ScenarioResult<()> {
        self.barrier.arrive_and_wait();
        self.lock.acquire();
        self.a.store_locked(&self.lock, HANDOFF_VALUE)?;
        self.cond_var.signal();
        self.lock.release()?;
        Ok(())
    }

    fn reader(&self) -> ScenarioResult<i32> {
        self.lock.acquire();
        // the writer cannot take the lock before we wait on the condition
        self.barrier.arrive_and_wait();
        while self.a.load_locked(&self.lock)? == 0 {
            self.cond_var.wait(&self.lock)?;
        }
        self.lock.release()?;
        // SAFETY: the writer stored `a` before signaling and never writes it
        // again; our wait returned after that signal.
        let b = unsafe { self.a.load() };
        debug!(b, "reader done");
        Ok(b)
    }
}

impl Scenario for SignaledHandoff {
    fn name(&self) -> &'static str {
        "signaled_handoff"
    }

    fn description(&self) -> &'static str {
        "read/write with proper synchronization through a condition variable"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Terminates
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        let lock = ctx.lock("lock");
        let handoff = Arc::new(Handoff {
            cond_var: ctx.condvar("cond_var", &lock),
            barrier: ctx.barrier("barrier", 2)?,
            a: ctx.shared("a", 0, Discipline::LockGuarded(lock.name().to_owned())),
            lock,
        });

        let writer = {
            let handoff = Arc::clone(&handoff);
            ctx.spawn("writer", move || handoff.writer())?
        };
        let reader = {
            let handoff = Arc::clone(&handoff);
            ctx.spawn("reader", move || handoff.reader())?
        };
        ctx.join_role(writer)?;
        let b = ctx.join(reader)??;
        // SAFETY: both roles have been joined
        let a = unsafe { handoff.a.load() };

        Ok(ScenarioReport::with_summary(format!("a = {}, b = {}", a, b))
            .value("a", a)
            .value("b", b))
    }
}
