// Purpose: Non-tree spawn/join graph with an unsynchronized write/write pair.
//
//   main ──spawn──> P ──spawn──> Q
//                   P ──spawn──> R
//   Q joins R, main joins Q, nobody joins P
//
// Spawn results of Q and R are published through polled lock + flag pairs,
// so a failed spawn reaches whoever would have joined the thread. main
// writes `s` after creating P and R writes it too; nothing orders those two
// writes, so the printed value depends on the schedule.

use std::fmt;
use std::sync::Arc;

use hazard_sync::{Discipline, PublishedHandle, SharedVariable};
use tracing::debug;

use super::{Expectation, Scenario, ScenarioReport};
use crate::error::{ScenarioError, ScenarioResult};
use crate::topology::{ScenarioContext, Worker};

/// Value of the raced variable. A single byte, so a load never observes a
/// torn write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    Unset,
    Hello,
    World,
}

impl Greeting {
    pub fn as_str(self) -> &'static str {
        match self {
            Greeting::Unset => "",
            Greeting::Hello => "hello",
            Greeting::World => "world",
        }
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeirdThreadGraph;

/// Where P leaves the outcome of spawning a child, failures included.
type SpawnSlot<T> = Arc<PublishedHandle<ScenarioResult<Worker<T>>>>;

struct Graph {
    ctx: ScenarioContext,
    q_spawn: SpawnSlot<ScenarioResult<()>>,
    r_spawn: SpawnSlot<()>,
    s: Arc<SharedVariable<Greeting>>,
}

impl Graph {
    fn run_p(self: Arc<Self>) -> ScenarioResult<()> {
        let graph = Arc::clone(&self);
        self.q_spawn
            .publish_with(|| Ok::<_, ScenarioError>(self.ctx.spawn("q", move || graph.run_q())))?;
        let graph = Arc::clone(&self);
        self.r_spawn
            .publish_with(|| Ok::<_, ScenarioError>(self.ctx.spawn("r", move || graph.run_r())))?;
        Ok(())
    }

    fn run_q(&self) -> ScenarioResult<()> {
        // join R while still holding the handle's lock
        let polled = self.r_spawn.poll(|r| r.and_then(|r| self.ctx.join(r)))?;
        debug!(retries = polled.retries, "q saw r");
        polled.value
    }

    fn run_r(&self) {
        // SAFETY: unordered with main's write on purpose; a one-byte value
        // never tears.
        unsafe { self.s.store(Greeting::World) };
    }
}

impl Scenario for WeirdThreadGraph {
    fn name(&self) -> &'static str {
        "weird_thread_graph"
    }

    fn description(&self) -> &'static str {
        "race between threads that do not follow the usual spawn/join tree"
    }

    fn expectation(&self) -> Expectation {
        Expectation::Race {
            variable: "s",
            outcomes: &["hello", "world"],
        }
    }

    fn run(&self, ctx: &ScenarioContext) -> ScenarioResult<ScenarioReport> {
        let graph = Arc::new(Graph {
            ctx: ctx.clone(),
            q_spawn: ctx.published("q_spawn"),
            r_spawn: ctx.published("r_spawn"),
            s: ctx.shared("s", Greeting::Unset, Discipline::Unguarded),
        });

        let p = {
            let graph = Arc::clone(&graph);
            ctx.spawn("p", move || graph.run_p())?
        };
        // SAFETY: races R's write on purpose; see `run_r`
        unsafe { graph.s.store(Greeting::Hello) };

        // copy Q's handle out under the lock, then join outside it
        let q = graph.q_spawn.poll(|q| q)?.value?;
        ctx.join_role(q)?;

        // SAFETY: R was joined by Q, which we joined
        let s = unsafe { graph.s.load() };
        ctx.detach(p);
        Ok(ScenarioReport::with_summary(s.to_string()).value("s", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::bounded;

    /// Run on a helper thread so a hang shows up as a timeout instead of a
    /// stuck test.
    fn run_within(ctx: ScenarioContext) -> Option<ScenarioResult<ScenarioReport>> {
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            let _ = tx.send(WeirdThreadGraph.run(&ctx));
        });
        rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    #[test]
    fn test_either_write_wins() {
        let report = run_within(ScenarioContext::unprofiled()).unwrap().unwrap();
        let s = report.get("s").unwrap();
        assert!(s == "hello" || s == "world", "{}", s);
    }

    #[test]
    fn test_failed_spawn_of_q_reaches_main() {
        let ctx = ScenarioContext::unprofiled().refuse_spawn("q");
        let result = run_within(ctx).expect("run hung after q failed to spawn");
        assert!(matches!(result, Err(ScenarioError::Spawn { thread, .. }) if thread == "q"));
    }

    #[test]
    fn test_failed_spawn_of_r_reaches_main_through_q() {
        let ctx = ScenarioContext::unprofiled().refuse_spawn("r");
        let result = run_within(ctx).expect("run hung after r failed to spawn");
        assert!(matches!(result, Err(ScenarioError::Spawn { thread, .. }) if thread == "r"));
    }
}
