// Purpose: Shared variables annotated with the synchronization discipline a scenario intends.
//
// The cell itself never synchronizes. Whether an access is ordered against
// another thread's access is decided entirely by the primitives the scenario
// wraps around it, which is what lets a race detector tell the correctly
// guarded scenarios from the racy one.

use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;

use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::primitives::Lock;
use crate::profile::SyncProfile;

/// How accesses to a [`SharedVariable`] are meant to be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discipline {
    /// No synchronization; races are part of the design.
    Unguarded,
    /// Reads and writes happen while holding the named lock.
    LockGuarded(String),
    /// Reads and writes happen inside the critical section of the named semaphore.
    SemaphoreGuarded(String),
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Unguarded => write!(f, "unguarded"),
            Discipline::LockGuarded(lock) => write!(f, "guarded by lock `{}`", lock),
            Discipline::SemaphoreGuarded(sem) => write!(f, "guarded by semaphore `{}`", sem),
        }
    }
}

/// Mutable cell shared between scenario threads.
///
/// Accesses are plain volatile loads and stores. Guarded accesses are
/// recorded into the profile; unguarded ones are not, because recording
/// takes the profile's mutex and would order the very accesses that are
/// supposed to race.
///
/// Only the lock-checked accessors are safe; an unsynchronized access has to
/// be spelled out:
///
/// ```compile_fail
/// use hazard_sync::{Discipline, SharedVariable, SyncProfile};
///
/// let s = SharedVariable::new("s", 0u8, Discipline::Unguarded, SyncProfile::disabled());
/// s.store(1);
/// ```
///
/// ```
/// use hazard_sync::{Discipline, SharedVariable, SyncProfile};
///
/// let s = SharedVariable::new("s", 0u8, Discipline::Unguarded, SyncProfile::disabled());
/// // SAFETY: no other thread sees `s`
/// unsafe { s.store(1) };
/// assert_eq!(unsafe { s.load() }, 1);
/// ```
pub struct SharedVariable<T> {
    name: String,
    discipline: Discipline,
    cell: UnsafeCell<T>,
    profile: SyncProfile,
}

// SAFETY: the cell is shared on purpose. Safe access goes through
// `load_locked`/`store_locked`, which check that the caller owns the guarding
// lock. Every other access is an `unsafe fn`, so an unordered access is
// always an explicit opt-in by the caller.
unsafe impl<T: Send> Sync for SharedVariable<T> {}

impl<T: Copy + fmt::Debug> SharedVariable<T> {
    pub fn new(name: impl Into<String>, initial: T, discipline: Discipline, profile: SyncProfile) -> Self {
        Self {
            name: name.into(),
            discipline,
            cell: UnsafeCell::new(initial),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discipline(&self) -> &Discipline {
        &self.discipline
    }

    /// Read the current value without any synchronization.
    ///
    /// # Safety
    ///
    /// Nothing orders this read against writes from other threads. The
    /// caller must either establish that order itself (the guarding
    /// primitive, a join) or be running the designed race on a value that
    /// cannot tear.
    pub unsafe fn load(&self) -> T {
        self.read()
    }

    /// Overwrite the value without any synchronization.
    ///
    /// # Safety
    ///
    /// Same contract as [`SharedVariable::load`].
    pub unsafe fn store(&self, value: T) {
        self.write(value)
    }

    /// Read-modify-write as two separate accesses; returns the old value.
    ///
    /// # Safety
    ///
    /// Same contract as [`SharedVariable::load`].
    pub unsafe fn update(&self, f: impl FnOnce(T) -> T) -> T {
        let old = self.read();
        self.write(f(old));
        old
    }

    /// Read after checking the caller holds the guarding lock.
    pub fn load_locked(&self, lock: &Lock) -> SyncResult<T> {
        self.check_lock(lock)?;
        Ok(self.read())
    }

    /// Write after checking the caller holds the guarding lock.
    pub fn store_locked(&self, lock: &Lock, value: T) -> SyncResult<()> {
        self.check_lock(lock)?;
        self.write(value);
        Ok(())
    }

    fn check_lock(&self, lock: &Lock) -> SyncResult<()> {
        match &self.discipline {
            Discipline::LockGuarded(guard) if guard == lock.name() => {}
            other => {
                return Err(SyncError::WrongGuard {
                    variable: self.name.clone(),
                    discipline: other.to_string(),
                    given: lock.name().to_owned(),
                })
            }
        }
        if !lock.is_held_by_current() {
            return Err(SyncError::GuardNotHeld {
                variable: self.name.clone(),
                guard: lock.name().to_owned(),
            });
        }
        Ok(())
    }

    fn read(&self) -> T {
        // SAFETY: callers either hold the checked guard or took on the
        // ordering contract of the public unsafe accessors.
        let value = unsafe { ptr::read_volatile(self.cell.get()) };
        self.record(value);
        value
    }

    fn write(&self, value: T) {
        // SAFETY: as in `read`.
        unsafe { ptr::write_volatile(self.cell.get(), value) };
        self.record(value);
    }

    fn record(&self, value: T) {
        if self.discipline != Discipline::Unguarded {
            trace!(variable = %self.name, ?value, "access");
            self.profile.access(&self.name, format!("{:?}", value));
        }
    }
}

impl<T> fmt::Debug for SharedVariable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedVariable")
            .field("name", &self.name)
            .field("discipline", &self.discipline)
            .finish()
    }
}
