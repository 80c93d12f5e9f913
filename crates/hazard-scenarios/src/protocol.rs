// Purpose: Reverse-order two-lock protocol shared by the deadlock and livelock scenarios.
//
// Both roles take their first lock, meet at a rendezvous, then go for the
// other role's first lock. Whether the second acquisition blocks or polls
// decides which hazard the pair reproduces.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hazard_sync::{Barrier, Lock, SharedVariable};
use tracing::debug;

use crate::error::ScenarioResult;

/// Which side of the pair a thread plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    First,
    Second,
}

impl Role {
    /// Thread number printed in critical-section lines.
    pub fn tid(self) -> u32 {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }

    pub fn thread_name(self) -> &'static str {
        match self {
            Role::First => "A",
            Role::Second => "B",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.thread_name())
    }
}

/// The order in which one role takes the shared pair of locks.
#[derive(Debug, Clone)]
pub struct AcquisitionOrder {
    pub first: Arc<Lock>,
    pub second: Arc<Lock>,
}

impl AcquisitionOrder {
    /// `First` takes `(a, b)`, `Second` takes `(b, a)`.
    pub fn for_role(role: Role, a: &Arc<Lock>, b: &Arc<Lock>) -> Self {
        let (first, second) = match role {
            Role::First => (a, b),
            Role::Second => (b, a),
        };
        Self {
            first: Arc::clone(first),
            second: Arc::clone(second),
        }
    }
}

/// How the second lock of the pair is taken.
#[derive(Debug, Clone)]
pub enum SecondAcquire {
    /// Block in `acquire`.
    Blocking,
    /// Try-acquire, sleeping `backoff` after each failure.
    Polling {
        backoff: Duration,
        /// Give up after this many failures; `None` polls forever.
        attempt_limit: Option<u64>,
        /// Failed attempts so far, readable from outside the role.
        attempts: Arc<AtomicU64>,
    },
}

/// How a role's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOutcome {
    /// Entered the critical section and saw this counter value.
    Entered { shared_var: u32 },
    /// Hit the attempt limit and backed out without entering.
    Starved { attempts: u64 },
}

/// Everything one role of the pair needs.
#[derive(Debug, Clone)]
pub struct PairRole {
    pub role: Role,
    pub order: AcquisitionOrder,
    pub rendezvous: Arc<Barrier>,
    pub shared_var: Arc<SharedVariable<u32>>,
    pub second: SecondAcquire,
}

impl PairRole {
    pub fn run(&self) -> ScenarioResult<RoleOutcome> {
        self.order.first.acquire();
        debug!(role = %self.role, lock = self.order.first.name(), "holding first lock");
        self.rendezvous.arrive_and_wait();

        match &self.second {
            SecondAcquire::Blocking => self.order.second.acquire(),
            SecondAcquire::Polling {
                backoff,
                attempt_limit,
                attempts,
            } => {
                while !self.order.second.try_acquire() {
                    let failed = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    if attempt_limit.is_some_and(|limit| failed >= limit) {
                        debug!(role = %self.role, attempts = failed, "giving up");
                        self.order.first.release()?;
                        return Ok(RoleOutcome::Starved { attempts: failed });
                    }
                    thread::sleep(*backoff);
                }
            }
        }

        let value = critical_section(self.role.tid(), &self.shared_var);
        self.order.second.release()?;
        self.order.first.release()?;
        Ok(RoleOutcome::Entered { shared_var: value })
    }
}

/// Print the counter and bump it; returns the value printed.
///
/// Only called once the role holds the whole critical section (both locks,
/// or the semaphore it waited on).
pub(crate) fn critical_section(tid: u32, shared_var: &SharedVariable<u32>) -> u32 {
    // SAFETY: the caller is inside the critical section, so no other role
    // touches `shared_var` concurrently.
    let value = unsafe { shared_var.update(|v| v.wrapping_add(1)) };
    eprintln!("thread #{} shared_var={}", tid, value);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_sync::{Discipline, SyncProfile};

    fn locks() -> (Arc<Lock>, Arc<Lock>) {
        let profile = SyncProfile::disabled();
        (
            Arc::new(Lock::new("m1", profile.clone())),
            Arc::new(Lock::new("m2", profile)),
        )
    }

    #[test]
    fn test_orders_are_reversed_between_roles() {
        let (m1, m2) = locks();
        let a = AcquisitionOrder::for_role(Role::First, &m1, &m2);
        let b = AcquisitionOrder::for_role(Role::Second, &m1, &m2);
        assert_eq!(a.first.name(), "m1");
        assert_eq!(a.second.name(), "m2");
        assert_eq!(b.first.name(), "m2");
        assert_eq!(b.second.name(), "m1");
    }

    #[test]
    fn test_uncontended_role_enters_critical_section() {
        let (m1, m2) = locks();
        let profile = SyncProfile::disabled();
        let role = PairRole {
            role: Role::First,
            order: AcquisitionOrder::for_role(Role::First, &m1, &m2),
            rendezvous: Arc::new(Barrier::new("b", 1, profile.clone()).unwrap()),
            shared_var: Arc::new(SharedVariable::new("shared_var", 7, Discipline::Unguarded, profile)),
            second: SecondAcquire::Blocking,
        };
        assert_eq!(role.run().unwrap(), RoleOutcome::Entered { shared_var: 7 });
        // SAFETY: the role has returned; nothing else holds the variable
        assert_eq!(unsafe { role.shared_var.load() }, 8);
        assert!(m1.owner().is_none());
        assert!(m2.owner().is_none());
    }

    #[test]
    fn test_polling_role_starves_when_second_lock_is_held() {
        let (m1, m2) = locks();
        let holder = {
            let m2 = Arc::clone(&m2);
            thread::spawn(move || {
                m2.acquire();
                thread::sleep(Duration::from_millis(200));
                m2.release().unwrap();
            })
        };
        while m2.owner().is_none() {
            thread::yield_now();
        }

        let profile = SyncProfile::disabled();
        let attempts = Arc::new(AtomicU64::new(0));
        let role = PairRole {
            role: Role::First,
            order: AcquisitionOrder::for_role(Role::First, &m1, &m2),
            rendezvous: Arc::new(Barrier::new("b", 1, profile.clone()).unwrap()),
            shared_var: Arc::new(SharedVariable::new("shared_var", 0, Discipline::Unguarded, profile)),
            second: SecondAcquire::Polling {
                backoff: Duration::from_millis(1),
                attempt_limit: Some(3),
                attempts: Arc::clone(&attempts),
            },
        };
        assert_eq!(role.run().unwrap(), RoleOutcome::Starved { attempts: 3 });
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        // backed out of its first lock
        assert!(m1.owner().is_none());
        holder.join().unwrap();
    }
}
