// Purpose: Builds the shared state of a scenario run and spawns and joins its threads.
//
// Every primitive and shared variable of a run is created here, before any
// worker starts, and handed to the role protocols through `Arc`. Nothing is
// process-global, so two runs never share a primitive.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use hazard_sync::{
    Barrier, ConditionVariable, Discipline, Lock, PublishedHandle, Semaphore, SharedVariable, SyncOp, SyncProfile,
    ThreadTag,
};
use tracing::{debug, info, warn};

use crate::error::{ScenarioError, ScenarioResult};

/// A spawned scenario thread.
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
}

impl<T> Worker<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("name", &self.name).finish()
    }
}

/// Owner of a run's primitives, shared state and threads.
///
/// Cloning is cheap; clones share the same profile, so a thread that spawns
/// or joins other threads takes a clone into its closure.
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    profile: SyncProfile,
    /// Thread names whose spawn fails as if the OS had refused it.
    refused_spawns: Arc<BTreeSet<String>>,
}

impl ScenarioContext {
    /// A context that records a sync profile.
    pub fn profiled() -> Self {
        Self::with_profile(SyncProfile::new())
    }

    /// A context that records nothing and adds no ordering of its own.
    pub fn unprofiled() -> Self {
        Self::with_profile(SyncProfile::disabled())
    }

    pub fn with_profile(profile: SyncProfile) -> Self {
        Self {
            profile,
            refused_spawns: Arc::default(),
        }
    }

    /// Make every later spawn of a thread named `thread` fail.
    ///
    /// Lets tests drive the paths a real thread-creation failure takes.
    pub fn refuse_spawn(mut self, thread: &str) -> Self {
        Arc::make_mut(&mut self.refused_spawns).insert(thread.to_owned());
        self
    }

    pub fn profile(&self) -> &SyncProfile {
        &self.profile
    }

    //-------------------------------------------------------------------------
    // Shared state
    //-------------------------------------------------------------------------

    pub fn lock(&self, name: &str) -> Arc<Lock> {
        Arc::new(Lock::new(name, self.profile.clone()))
    }

    pub fn semaphore(&self, name: &str, initial: u32) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(name, initial, self.profile.clone()))
    }

    pub fn condvar(&self, name: &str, lock: &Arc<Lock>) -> Arc<ConditionVariable> {
        Arc::new(ConditionVariable::new(name, Arc::clone(lock), self.profile.clone()))
    }

    pub fn barrier(&self, name: &str, parties: usize) -> ScenarioResult<Arc<Barrier>> {
        Ok(Arc::new(Barrier::new(name, parties, self.profile.clone())?))
    }

    pub fn shared<T>(&self, name: &str, initial: T, discipline: Discipline) -> Arc<SharedVariable<T>>
    where
        T: Copy + fmt::Debug,
    {
        Arc::new(SharedVariable::new(name, initial, discipline, self.profile.clone()))
    }

    pub fn published<T>(&self, name: &str) -> Arc<PublishedHandle<T>> {
        Arc::new(PublishedHandle::new(name, self.profile.clone()))
    }

    //-------------------------------------------------------------------------
    // Threads
    //-------------------------------------------------------------------------

    /// Spawn a named OS thread running `role`.
    pub fn spawn<T, F>(&self, name: &str, role: F) -> ScenarioResult<Worker<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.profile.begin(SyncOp::ThreadCreate, name);
        let spawned = if self.refused_spawns.contains(name) {
            Err(io::Error::new(io::ErrorKind::Other, "spawn refused by fault injection"))
        } else {
            thread::Builder::new().name(name.to_owned()).spawn(role)
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                self.profile.finish_with(ticket, "failed");
                warn!(thread = name, error = %source, "spawn failed");
                return Err(ScenarioError::Spawn {
                    thread: name.to_owned(),
                    source,
                });
            }
        };
        self.profile
            .finish_create(ticket, ThreadTag::new(handle.thread().id(), Some(name.to_owned())));
        debug!(thread = name, "spawned");
        Ok(Worker {
            name: name.to_owned(),
            handle,
        })
    }

    /// Block until `worker` exits and return what its role returned.
    pub fn join<T>(&self, worker: Worker<T>) -> ScenarioResult<T> {
        let Worker { name, handle } = worker;
        let joined = handle.thread().id();
        let ticket = self.profile.begin(SyncOp::ThreadJoin, &name);
        let result = handle.join();
        self.profile.finish_join(ticket, joined);
        match result {
            Ok(value) => {
                debug!(thread = %name, "joined");
                Ok(value)
            }
            Err(_) => Err(ScenarioError::ThreadPanicked(name)),
        }
    }

    /// Join a worker whose role itself returns a scenario result.
    pub fn join_role(&self, worker: Worker<ScenarioResult<()>>) -> ScenarioResult<()> {
        self.join(worker)?
    }

    /// Leave `worker` running; its thread is never joined.
    pub fn detach<T>(&self, worker: Worker<T>) {
        info!(thread = %worker.name, "left running without a join");
        drop(worker.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_join_return_role_value() {
        let ctx = ScenarioContext::profiled();
        let worker = ctx.spawn("adder", || 2 + 2).unwrap();
        assert_eq!(worker.name(), "adder");
        assert_eq!(ctx.join(worker).unwrap(), 4);

        let counts = ctx.profile().occurrences();
        assert_eq!(counts.get(&SyncOp::ThreadCreate), Some(&1));
        assert_eq!(counts.get(&SyncOp::ThreadJoin), Some(&1));
        let links: Vec<_> = ctx.profile().links().into_iter().map(|l| l.name).collect();
        assert!(links.contains(&"thread started"));
        assert!(links.contains(&"thread finished"));
    }

    #[test]
    fn test_refused_spawn_is_reported_and_closes_its_event() {
        let ctx = ScenarioContext::profiled().refuse_spawn("doomed");
        let result = ctx.spawn("doomed", || ());
        assert!(matches!(result, Err(ScenarioError::Spawn { thread, .. }) if thread == "doomed"));
        // other names still spawn
        let worker = ctx.spawn("fine", || 1).unwrap();
        assert_eq!(ctx.join(worker).unwrap(), 1);

        assert!(ctx.profile().pending().is_empty());
        let failed: Vec<_> = ctx
            .profile()
            .events()
            .into_iter()
            .filter(|e| e.op == SyncOp::ThreadCreate && e.value.as_deref() == Some("failed"))
            .map(|e| e.object)
            .collect();
        assert_eq!(failed, vec!["doomed".to_owned()]);
    }

    #[test]
    fn test_join_of_panicked_thread_is_an_error() {
        let ctx = ScenarioContext::unprofiled();
        let worker = ctx.spawn("doomed", || panic!("role failed")).unwrap();
        assert!(matches!(ctx.join::<()>(worker), Err(ScenarioError::ThreadPanicked(name)) if name == "doomed"));
    }

    #[test]
    fn test_join_role_flattens_role_errors() {
        let ctx = ScenarioContext::unprofiled();
        let lock = ctx.lock("m");
        let worker = ctx
            .spawn("releaser", move || -> ScenarioResult<()> {
                lock.release()?;
                Ok(())
            })
            .unwrap();
        assert!(matches!(ctx.join_role(worker), Err(ScenarioError::Sync(_))));
    }
}
