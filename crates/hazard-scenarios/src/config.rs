//! Configuration for the scenario corpus
//!
//! Every field has a default that reproduces the designed behavior, so an
//! empty (or missing) TOML file runs the corpus as built. Command-line flags
//! override file values.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ScenarioError, ScenarioResult};

//-----------------------------------------------------------------------------
// Defaults
//-----------------------------------------------------------------------------

/// Worker count of the smoke scenario unless overridden at build time.
pub const DEFAULT_SMOKE_THREADS: usize = 2;

/// Worker count of the smoke scenario, honoring a build-time
/// `HAZARD_SMOKE_THREADS` override.
pub fn build_time_smoke_threads() -> usize {
    option_env!("HAZARD_SMOKE_THREADS")
        .and_then(|value| value.trim().parse().ok())
        .filter(|threads: &usize| *threads > 0)
        .unwrap_or(DEFAULT_SMOKE_THREADS)
}

//-----------------------------------------------------------------------------
// Configuration Structures
//-----------------------------------------------------------------------------

/// Profile output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Timeline plus occurrence table
    #[default]
    Text,
    /// Chrome trace-viewer JSON
    Chrome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmokeConfig {
    pub threads: usize,
    pub iterations: u32,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            threads: build_time_smoke_threads(),
            iterations: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LivelockConfig {
    /// Sleep between failed attempts on the second lock.
    pub backoff_ms: u64,
    /// Give up after this many failed attempts. Unset means poll forever.
    pub attempt_limit: Option<u64>,
}

impl Default for LivelockConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 100,
            attempt_limit: None,
        }
    }
}

impl LivelockConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockstepConfig {
    /// Rounds each worker performs.
    pub iterations: u32,
}

impl Default for LockstepConfig {
    fn default() -> Self {
        Self { iterations: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Wall-clock limit before a run is declared stuck.
    pub timeout_secs: u64,
    pub output_format: OutputFormat,
    /// Record a sync profile during harness runs.
    pub profile: bool,
    /// Also record one for race scenarios. The recorder's own lock orders
    /// the raced accesses, so it is off unless asked for.
    pub profile_races: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 2,
            output_format: OutputFormat::Text,
            profile: true,
            profile_races: false,
        }
    }
}

impl HarnessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration of the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusConfig {
    pub smoke: SmokeConfig,
    pub livelock: LivelockConfig,
    pub lockstep: LockstepConfig,
    pub harness: HarnessConfig,
}

impl CorpusConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> ScenarioResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ScenarioError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> ScenarioResult<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> ScenarioResult<()> {
        if self.smoke.threads == 0 {
            return Err(ScenarioError::Configuration("smoke.threads must be at least 1".into()));
        }
        if self.livelock.attempt_limit == Some(0) {
            return Err(ScenarioError::Configuration(
                "livelock.attempt_limit must be at least 1; leave it unset to poll forever".into(),
            ));
        }
        if self.lockstep.iterations == 0 {
            return Err(ScenarioError::Configuration("lockstep.iterations must be at least 1".into()));
        }
        if self.harness.timeout_secs == 0 {
            return Err(ScenarioError::Configuration("harness.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_designed_defaults() {
        let config = CorpusConfig::from_toml_str("").unwrap();
        assert_eq!(config, CorpusConfig::default());
        assert_eq!(config.smoke.iterations, 32);
        assert_eq!(config.livelock.backoff(), Duration::from_millis(100));
        assert_eq!(config.livelock.attempt_limit, None);
        assert_eq!(config.lockstep.iterations, 5);
        assert_eq!(config.harness.timeout(), Duration::from_secs(2));
        assert!(config.harness.profile);
        assert!(!config.harness.profile_races);
    }

    #[test]
    fn test_partial_document_overrides_fields() {
        let config = CorpusConfig::from_toml_str(
            r#"
            [smoke]
            threads = 4

            [livelock]
            backoff_ms = 5
            attempt_limit = 20

            [harness]
            output_format = "chrome"
            "#,
        )
        .unwrap();

        assert_eq!(config.smoke.threads, 4);
        assert_eq!(config.smoke.iterations, 32);
        assert_eq!(config.livelock.attempt_limit, Some(20));
        assert_eq!(config.harness.output_format, OutputFormat::Chrome);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            CorpusConfig::from_toml_str("[smoke]\nthreads = 0\n"),
            Err(ScenarioError::Configuration(_))
        ));
        assert!(matches!(
            CorpusConfig::from_toml_str("[nonsense]\n"),
            Err(ScenarioError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_attempt_limit_is_rejected() {
        let result = CorpusConfig::from_toml_str("[livelock]\nattempt_limit = 0\n");
        assert!(matches!(result, Err(ScenarioError::Configuration(msg)) if msg.contains("attempt_limit")));
        assert!(CorpusConfig::from_toml_str("[livelock]\nattempt_limit = 1\n").is_ok());
    }
}
