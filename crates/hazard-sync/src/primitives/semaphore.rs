// Purpose: Counting semaphore with blocking wait and waking post.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::profile::{SyncOp, SyncProfile};

/// Counting semaphore. The count never goes below zero.
#[derive(Debug)]
pub struct Semaphore {
    name: String,
    count: Mutex<u32>,
    available: Condvar,
    profile: SyncProfile,
}

impl Semaphore {
    pub fn new(name: impl Into<String>, initial: u32, profile: SyncProfile) -> Self {
        Self {
            name: name.into(),
            count: Mutex::new(initial),
            available: Condvar::new(),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block while the count is zero, then take one unit.
    pub fn wait(&self) {
        let ticket = self.profile.begin(SyncOp::SemWait, &self.name);
        let mut count = self.count.lock();
        while *count == 0 {
            self.available.wait(&mut count);
        }
        *count -= 1;
        trace!(semaphore = %self.name, count = *count, "wait satisfied");
        drop(count);
        self.profile.finish(ticket);
    }

    /// Add one unit and wake one waiter.
    pub fn post(&self) -> SyncResult<()> {
        let ticket = self.profile.begin(SyncOp::SemPost, &self.name);
        let mut count = self.count.lock();
        let Some(next) = count.checked_add(1) else {
            drop(count);
            self.profile.finish_with(ticket, "overflow");
            return Err(SyncError::Overflow(self.name.clone()));
        };
        *count = next;
        trace!(semaphore = %self.name, count = *count, "posted");
        self.available.notify_one();
        drop(count);
        self.profile.finish(ticket);
        Ok(())
    }

    /// Current count.
    pub fn value(&self) -> u32 {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_initial_count_is_consumed_without_blocking() {
        let sem = Semaphore::new("s", 2, SyncProfile::disabled());
        sem.wait();
        sem.wait();
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn test_post_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new("s", 0, SyncProfile::disabled()));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        sem.post().unwrap();
        waiter.join().unwrap();
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn test_post_overflow_is_reported() {
        let sem = Semaphore::new("s", u32::MAX, SyncProfile::disabled());
        assert_eq!(sem.post(), Err(SyncError::Overflow("s".to_owned())));
        assert_eq!(sem.value(), u32::MAX);
    }
}
