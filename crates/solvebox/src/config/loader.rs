//! Configuration file loading for Solvebox
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};
use crate::types::ResourceLimits;

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bench_runs == 0 {
            return Err(ConfigError::Invalid(
                "bench_runs must be at least 1".to_string(),
            ));
        }
        if !(self.suite_timeout.is_finite() && self.suite_timeout > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "suite_timeout must be a positive number of seconds, got {}",
                self.suite_timeout
            )));
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.image.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty image"
                )));
            }
            check_ceilings(id, &self.effective_limits(lang))?;
        }

        Ok(())
    }
}

/// Every sandbox needs a positive memory, CPU, process, wall-time, and output ceiling
fn check_ceilings(id: &str, limits: &ResourceLimits) -> Result<(), ConfigError> {
    let positive = |value: Option<f64>| value.is_some_and(|v| v.is_finite() && v > 0.0);
    let ceilings = [
        ("memory_limit", limits.memory_limit.is_some_and(|mb| mb > 0)),
        ("cpus", positive(limits.cpus)),
        ("max_processes", limits.max_processes.is_some_and(|n| n > 0)),
        ("wall_time_limit", positive(limits.wall_time_limit)),
        ("max_output", limits.max_output.is_some_and(|kb| kb > 0)),
    ];

    match ceilings.iter().find(|(_, ok)| !ok) {
        Some((field, _)) => Err(ConfigError::Invalid(format!(
            "language '{id}' needs a positive {field}"
        ))),
        None => Ok(()),
    }
}
