//! Hazard Scenarios
//!
//! A corpus of controlled multi-thread interactions, each built to expose or
//! deliberately avoid one class of concurrency hazard. The scenarios are
//! ground truth for defect-detection tools: a deadlocking scenario hangs, a
//! racy one prints whichever write won.
//!
//! ## Scenarios
//!
//! | name | designed behavior |
//! |---|---|
//! | `signaled_handoff` | terminates, `a = 4, b = 4` |
//! | `deadlock_mutex` | circular wait over two locks |
//! | `deadlock_sem` | circular wait over two semaphores |
//! | `livelock` | reverse-order try-acquire polling |
//! | `semaphore_workers` | lockstep workers, no race |
//! | `weird_thread_graph` | non-tree spawn/join graph, write/write race |
//! | `smoke_test` | lock contention around a counter |
//!
//! Every scenario has its own executable; the `hazard` binary runs any of
//! them under a timeout and can emit a sync profile.

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod protocol;
pub mod scenarios;
pub mod topology;

pub use config::{CorpusConfig, OutputFormat};
pub use error::{ScenarioError, ScenarioResult};
pub use harness::{run_with_timeout, Outcome, Run, RunOptions, Verdict};
pub use scenarios::{Expectation, Scenario, ScenarioReport};
pub use topology::{ScenarioContext, Worker};
