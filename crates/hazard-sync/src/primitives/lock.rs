// Purpose: Binary mutual-exclusion lock with explicit acquire/release and owner tracking.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::profile::{SyncOp, SyncProfile};
use crate::thread::ThreadTag;

/// Mutual-exclusion lock that is not tied to a guard's scope.
///
/// Ownership is taken with [`Lock::acquire`] or [`Lock::try_acquire`] and
/// handed back with [`Lock::release`], so a protocol can release in any order
/// and a condition variable can drop and retake it. Waiting acquirers are
/// parked, never spinning. Acquiring a lock the caller already owns blocks
/// forever, as a non-recursive mutex does.
#[derive(Debug)]
pub struct Lock {
    name: String,
    owner: Mutex<Option<ThreadTag>>,
    released: Condvar,
    profile: SyncProfile,
}

impl Lock {
    pub fn new(name: impl Into<String>, profile: SyncProfile) -> Self {
        Self {
            name: name.into(),
            owner: Mutex::new(None),
            released: Condvar::new(),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the calling thread owns the lock.
    pub fn acquire(&self) {
        let ticket = self.profile.begin(SyncOp::LockAcquire, &self.name);
        let me = ThreadTag::current();
        let mut owner = self.owner.lock();
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        trace!(lock = %self.name, thread = %me, "acquired");
        *owner = Some(me);
        drop(owner);
        self.profile.finish(ticket);
    }

    /// Take the lock if it is free; never blocks.
    pub fn try_acquire(&self) -> bool {
        let ticket = self.profile.begin(SyncOp::LockTryAcquire, &self.name);
        let acquired = {
            let mut owner = self.owner.lock();
            if owner.is_none() {
                *owner = Some(ThreadTag::current());
                true
            } else {
                false
            }
        };
        trace!(lock = %self.name, acquired, "try-acquire");
        self.profile.finish_try(ticket, acquired);
        acquired
    }

    /// Give the lock back and wake one waiting acquirer.
    ///
    /// Only the owner may release; anybody else gets [`SyncError::NotOwner`]
    /// and the lock is left as it was.
    pub fn release(&self) -> SyncResult<()> {
        let mut owner = self.owner.lock();
        match owner.as_ref() {
            Some(tag) if tag.is_current() => {}
            other => {
                return Err(SyncError::NotOwner {
                    lock: self.name.clone(),
                    owner: other.map(ToString::to_string).unwrap_or_else(|| "nobody".to_owned()),
                })
            }
        }
        let ticket = self.profile.begin(SyncOp::LockRelease, &self.name);
        *owner = None;
        self.released.notify_one();
        drop(owner);
        trace!(lock = %self.name, "released");
        self.profile.finish(ticket);
        Ok(())
    }

    /// Current owner, if any.
    pub fn owner(&self) -> Option<ThreadTag> {
        self.owner.lock().clone()
    }

    /// True when the calling thread owns the lock.
    pub fn is_held_by_current(&self) -> bool {
        self.owner.lock().as_ref().is_some_and(ThreadTag::is_current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_release_tracks_owner() {
        let lock = Lock::new("m", SyncProfile::disabled());
        assert!(lock.owner().is_none());

        lock.acquire();
        assert!(lock.is_held_by_current());
        lock.release().unwrap();
        assert!(lock.owner().is_none());
    }

    #[test]
    fn test_release_by_non_owner_is_rejected() {
        let lock = Arc::new(Lock::new("m", SyncProfile::disabled()));
        lock.acquire();

        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.release()).join().unwrap();
        assert!(matches!(result, Err(SyncError::NotOwner { .. })));
        assert!(lock.is_held_by_current());
        lock.release().unwrap();
    }

    #[test]
    fn test_release_of_free_lock_is_rejected() {
        let lock = Lock::new("m", SyncProfile::disabled());
        let err = lock.release().unwrap_err();
        assert_eq!(
            err,
            SyncError::NotOwner {
                lock: "m".to_owned(),
                owner: "nobody".to_owned()
            }
        );
    }

    #[test]
    fn test_try_acquire_fails_while_held_elsewhere() {
        let lock = Arc::new(Lock::new("m", SyncProfile::disabled()));
        lock.acquire();

        let other = Arc::clone(&lock);
        let took = thread::spawn(move || other.try_acquire()).join().unwrap();
        assert!(!took);

        lock.release().unwrap();
        assert!(lock.try_acquire());
        lock.release().unwrap();
    }

    #[test]
    fn test_blocked_acquirer_proceeds_after_release() {
        let lock = Arc::new(Lock::new("m", SyncProfile::new()));
        lock.acquire();

        let other = Arc::clone(&lock);
        let waiter = thread::Builder::new()
            .name("waiter".into())
            .spawn(move || {
                other.acquire();
                other.release().unwrap();
            })
            .unwrap();

        lock.release().unwrap();
        waiter.join().unwrap();
        assert!(lock.owner().is_none());
    }
}
