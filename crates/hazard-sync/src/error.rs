//! Error types for the primitive layer
//!
//! Misuse of a primitive (releasing a lock you do not own, waiting on a
//! condition variable with the wrong lock, taking a published value twice)
//! surfaces here. Blocking forever is not an error: it is what the
//! deadlocking scenarios are built to do.

//-----------------------------------------------------------------------------
// Error Types
//-----------------------------------------------------------------------------

use thiserror::Error;

/// Main error type for the primitive layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A lock was released (or waited on) by a thread that does not own it.
    #[error("lock `{lock}` is not owned by the calling thread (owner: {owner})")]
    NotOwner { lock: String, owner: String },

    /// A condition variable was waited on with a lock it is not bound to.
    #[error("condition variable `{condvar}` is bound to `{bound}`, not `{given}`")]
    WrongLock {
        condvar: String,
        bound: String,
        given: String,
    },

    /// A barrier was constructed with zero parties.
    #[error("barrier `{0}` needs at least one party")]
    InvalidParties(String),

    /// A semaphore count would exceed `u32::MAX`.
    #[error("semaphore `{0}` count overflow")]
    Overflow(String),

    /// A guarded access was attempted without holding the guard.
    #[error("`{variable}` is guarded by `{guard}`, which the calling thread does not hold")]
    GuardNotHeld { variable: String, guard: String },

    /// A guarded access named a lock other than the declared guard.
    #[error("`{variable}` is declared {discipline}, access used `{given}`")]
    WrongGuard {
        variable: String,
        discipline: String,
        given: String,
    },

    /// A published value was taken more than once.
    #[error("published handle `{0}` was already taken")]
    AlreadyTaken(String),
}

/// Result type alias for primitive operations.
pub type SyncResult<T> = Result<T, SyncError>;
