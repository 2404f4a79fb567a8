use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub use crate::config::language::{ImageRef, Language};
use crate::types::ResourceLimits;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../solvebox.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid image reference '{0}'")]
    InvalidImage(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for Solvebox
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the container runtime binary (`docker` from PATH if not specified).
    ///
    /// Any runtime accepting docker's `run` flags works, e.g. podman.
    #[serde(default)]
    pub runtime_path: Option<PathBuf>,

    /// Number of warm sandbox processes kept ready per language
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long an acquisition waits for a replenishing process before
    /// spawning one on demand, in milliseconds
    #[serde(default = "default_acquire_wait_ms")]
    pub acquire_wait_ms: u64,

    /// Independent sandbox runs per test case for time-scored puzzles
    #[serde(default = "default_bench_runs")]
    pub bench_runs: u32,

    /// Overall deadline for a full test-suite run, in seconds
    #[serde(default = "default_suite_timeout")]
    pub suite_timeout: f64,

    /// Default resource limits applied to every sandbox
    ///
    /// Fields missing from the file keep the built-in ceilings.
    #[serde(default, deserialize_with = "limits_over_builtin")]
    pub default_limits: ResourceLimits,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            runtime_path: None,
            pool_size: default_pool_size(),
            acquire_wait_ms: default_acquire_wait_ms(),
            bench_runs: default_bench_runs(),
            suite_timeout: default_suite_timeout(),
            default_limits: ResourceLimits::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Get the path to the container runtime binary
    pub fn runtime_binary(&self) -> PathBuf {
        self.runtime_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("docker"))
    }

    /// Merge a language's resource limits over the defaults
    pub fn effective_limits(&self, language: &Language) -> ResourceLimits {
        match language.limits {
            Some(ref limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }

    pub fn acquire_wait(&self) -> Duration {
        Duration::from_millis(self.acquire_wait_ms)
    }

    pub fn suite_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.suite_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn limits_over_builtin<'de, D>(deserializer: D) -> Result<ResourceLimits, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = ResourceLimits::deserialize(deserializer)?;
    Ok(ResourceLimits::default().with_overrides(&partial))
}

fn default_pool_size() -> usize {
    3
}

fn default_acquire_wait_ms() -> u64 {
    50
}

fn default_bench_runs() -> u32 {
    3
}

fn default_suite_timeout() -> f64 {
    30.0
}
