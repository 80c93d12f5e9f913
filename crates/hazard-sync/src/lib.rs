//! Hazard Sync
//!
//! Building blocks for controlled multi-thread interaction scenarios.
//!
//! ## Core Components
//!
//! - **Primitives**: [`Lock`], [`Semaphore`], [`ConditionVariable`] and
//!   [`Barrier`], all blocking the calling OS thread with no timeouts
//! - **Shared state**: [`SharedVariable`] with a declared [`Discipline`], and
//!   [`PublishedHandle`] for values that appear after other threads start
//!   looking for them
//! - **Profiling**: [`SyncProfile`] records every synchronization point,
//!   derives lock blocks and wakeup links, and renders text or Chrome
//!   trace output
//!
//! ## Getting Started
//! ```rust,no_run
//! use std::sync::Arc;
//! use hazard_sync::{Lock, SyncProfile};
//!
//! let profile = SyncProfile::new();
//! let lock = Arc::new(Lock::new("m", profile.clone()));
//! lock.acquire();
//! lock.release().unwrap();
//! print!("{}", profile.render_text());
//! ```

pub mod error;
pub mod primitives;
pub mod profile;
pub mod published;
pub mod shared;
pub mod thread;

pub use error::{SyncError, SyncResult};
pub use primitives::{Barrier, ConditionVariable, Lock, Semaphore};
pub use profile::{
    EventStatus, FlowLink, HeldLock, LockBlock, Mark, PendingEvent, SyncEvent, SyncOp, SyncProfile,
};
pub use published::{Polled, PublishedHandle};
pub use shared::{Discipline, SharedVariable};
pub use thread::ThreadTag;
