//! Blocking synchronization primitives
//!
//! Four primitive kinds every scenario is composed from. All blocking calls
//! park the calling OS thread until another thread performs the matching
//! operation; none can be cancelled and none time out.

mod barrier;
mod condvar;
mod lock;
mod semaphore;

pub use barrier::Barrier;
pub use condvar::ConditionVariable;
pub use lock::Lock;
pub use semaphore::Semaphore;
