//! Error types for Scenarios
//!
//! This module defines the error types used by the topology driver, the
//! scenario protocols and the harness. Infrastructure failures (a thread that
//! cannot be created, a joined thread that panicked) are fatal to the run.

//-----------------------------------------------------------------------------
// Error Types
//-----------------------------------------------------------------------------

use hazard_sync::SyncError;
use thiserror::Error;

/// Main error type for the scenarios crate.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// The OS refused to create a thread.
    #[error("failed to spawn thread `{thread}`: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },

    /// A joined thread panicked instead of returning.
    #[error("thread `{0}` panicked")]
    ThreadPanicked(String),

    /// A primitive was misused by a role protocol.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// No scenario is registered under the given name.
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// Represents an error during configuration loading or validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Represents a file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Represents a serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for scenario operations.
pub type ScenarioResult<T> = Result<T, ScenarioError>;
