// Purpose: Publishes a value created by one thread to threads that poll for it.

use std::cell::UnsafeCell;
use std::fmt;
use std::thread;

use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::primitives::Lock;
use crate::profile::SyncProfile;

struct Slot<T> {
    value: Option<T>,
    ready: bool,
}

/// A value slot plus a ready flag, both guarded by one [`Lock`].
///
/// The publisher creates the value while holding the lock. Observers poll:
/// take the lock, check the flag, and either consume the value or release and
/// yield. No condition variable is attached to the flag, so observers never
/// block on it; they only ever block on the lock itself.
pub struct PublishedHandle<T> {
    name: String,
    lock: Lock,
    slot: UnsafeCell<Slot<T>>,
}

// SAFETY: `slot` is only read or written while `lock` is owned by the
// accessing thread.
unsafe impl<T: Send> Sync for PublishedHandle<T> {}

/// Result of a successful poll.
#[derive(Debug)]
pub struct Polled<R> {
    pub value: R,
    /// Number of times the flag was found unset before it was ready.
    pub retries: u64,
}

impl<T> PublishedHandle<T> {
    /// Create an empty handle; its lock is named `<name>_lock`.
    pub fn new(name: impl Into<String>, profile: SyncProfile) -> Self {
        let name = name.into();
        Self {
            lock: Lock::new(format!("{}_lock", name), profile),
            name,
            slot: UnsafeCell::new(Slot {
                value: None,
                ready: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the value under the lock and mark it ready.
    ///
    /// If `create` fails nothing is published and the error is returned.
    pub fn publish_with<E>(&self, create: impl FnOnce() -> Result<T, E>) -> Result<(), E>
    where
        E: From<SyncError>,
    {
        self.lock.acquire();
        match create() {
            Ok(value) => {
                // SAFETY: we own `lock`.
                let slot = unsafe { &mut *self.slot.get() };
                slot.value = Some(value);
                slot.ready = true;
                trace!(handle = %self.name, "published");
                self.lock.release()?;
                Ok(())
            }
            Err(err) => {
                self.lock.release()?;
                Err(err)
            }
        }
    }

    /// Whether the value has been published (it may since have been taken).
    pub fn is_ready(&self) -> SyncResult<bool> {
        self.lock.acquire();
        // SAFETY: we own `lock`.
        let ready = unsafe { (*self.slot.get()).ready };
        self.lock.release()?;
        Ok(ready)
    }

    /// Poll until the value is published, then hand it to `with` while the
    /// lock is still held.
    ///
    /// Between attempts the lock is released and the thread yields. The value
    /// can be taken once; later polls fail with [`SyncError::AlreadyTaken`].
    pub fn poll<R>(&self, with: impl FnOnce(T) -> R) -> SyncResult<Polled<R>> {
        let mut retries = 0u64;
        loop {
            self.lock.acquire();
            // SAFETY: we own `lock`.
            let slot = unsafe { &mut *self.slot.get() };
            if slot.ready {
                let taken = slot.value.take();
                let Some(value) = taken else {
                    self.lock.release()?;
                    return Err(SyncError::AlreadyTaken(self.name.clone()));
                };
                let value = with(value);
                self.lock.release()?;
                trace!(handle = %self.name, retries, "observed");
                return Ok(Polled { value, retries });
            }
            self.lock.release()?;
            retries += 1;
            thread::yield_now();
        }
    }
}

impl<T> fmt::Debug for PublishedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishedHandle")
            .field("name", &self.name)
            .field("lock", &self.lock.name())
            .finish()
    }
}
