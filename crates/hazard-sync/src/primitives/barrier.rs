// Purpose: Rendezvous barrier for a fixed number of parties.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{SyncError, SyncResult};
use crate::profile::{SyncOp, SyncProfile};

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

/// Barrier for `parties` threads. Generations make it safe to reuse across
/// rounds as long as every round has the same party count.
#[derive(Debug)]
pub struct Barrier {
    name: String,
    parties: usize,
    state: Mutex<BarrierState>,
    all_arrived: Condvar,
    profile: SyncProfile,
}

impl Barrier {
    pub fn new(name: impl Into<String>, parties: usize, profile: SyncProfile) -> SyncResult<Self> {
        let name = name.into();
        if parties == 0 {
            return Err(SyncError::InvalidParties(name));
        }
        Ok(Self {
            name,
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            all_arrived: Condvar::new(),
            profile,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Block until all parties of the current generation have arrived.
    ///
    /// Returns `true` for exactly one party per generation, the last to arrive.
    pub fn arrive_and_wait(&self) -> bool {
        let ticket = self.profile.begin(SyncOp::BarrierWait, &self.name);
        let mut state = self.state.lock();
        state.arrived += 1;
        let leader = if state.arrived == self.parties {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.all_arrived.notify_all();
            true
        } else {
            let generation = state.generation;
            while state.generation == generation {
                self.all_arrived.wait(&mut state);
            }
            false
        };
        drop(state);
        trace!(barrier = %self.name, leader, "passed");
        self.profile.finish(ticket);
        leader
    }
}
