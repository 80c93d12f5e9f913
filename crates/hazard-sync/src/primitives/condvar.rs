// Purpose: Condition variable bound to one Lock.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use super::Lock;
use crate::error::{SyncError, SyncResult};
use crate::profile::{SyncOp, SyncProfile};

/// Condition variable permanently paired with one [`Lock`].
///
/// A waiter registers against the current signal generation before it gives
/// up the lock, so a signal issued after the release is never lost. Wakeups
/// may be spurious; callers re-check their predicate in a loop.
#[derive(Debug)]
pub struct ConditionVariable {
    name: String,
    lock: Arc<Lock>,
    generation: Mutex<u64>,
    cond: Condvar,
    profile: SyncProfile,
}

impl ConditionVariable {
    pub fn new(name: impl Into<String>, lock: Arc<Lock>, profile: SyncProfile) -> Self {
        Self {
            name: name.into(),
            lock,
            generation: Mutex::new(0),
            cond: Condvar::new(),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lock this condition variable is bound to.
    pub fn lock(&self) -> &Arc<Lock> {
        &self.lock
    }

    /// Release `lock`, block until signaled, then re-acquire `lock`.
    ///
    /// `lock` must be the bound lock and must be owned by the caller.
    pub fn wait(&self, lock: &Lock) -> SyncResult<()> {
        if !std::ptr::eq(lock, Arc::as_ptr(&self.lock)) {
            return Err(SyncError::WrongLock {
                condvar: self.name.clone(),
                bound: self.lock.name().to_owned(),
                given: lock.name().to_owned(),
            });
        }
        let ticket = self.profile.begin(SyncOp::CondWait, &self.name);
        let mut generation = self.generation.lock();
        let seen = *generation;
        if let Err(err) = lock.release() {
            drop(generation);
            self.profile.finish_with(ticket, "not owner");
            return Err(err);
        }
        while *generation == seen {
            self.cond.wait(&mut generation);
        }
        drop(generation);
        trace!(condvar = %self.name, "woken");
        self.profile.finish(ticket);
        lock.acquire();
        Ok(())
    }

    /// Wake at least one waiter.
    pub fn signal(&self) {
        let ticket = self.profile.begin(SyncOp::CondSignal, &self.name);
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_one();
        drop(generation);
        trace!(condvar = %self.name, "signaled");
        self.profile.finish(ticket);
    }

    /// Wake every waiter.
    pub fn broadcast(&self) {
        let ticket = self.profile.begin(SyncOp::CondBroadcast, &self.name);
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
        drop(generation);
        trace!(condvar = %self.name, "broadcast");
        self.profile.finish(ticket);
    }
}
