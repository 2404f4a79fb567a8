//! Integration tests for solvebox
//!
//! These tests run real containers and need docker (or `SOLVEBOX_RUNTIME`)
//! plus the `node:20-alpine` and `python:3.12-alpine` images.
//! Run with: cargo test -p solvebox --features integration-tests
//!
//! Tests that start containers are marked `#[ignore]`. To include them:
//!    cargo test -p solvebox --features integration-tests -- --include-ignored

#![cfg(feature = "integration-tests")]

use std::fs;

use solvebox::config::Config;
use solvebox::types::{ScoringMode, SuiteRequest, TestCase};

mod config_loading;
mod execution;
mod sandbox_lifecycle;
mod scoring;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture_source(name: &str) -> String {
    let path = format!("{FIXTURES_PATH}/sources/{name}");
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

/// Default config, pointed at `SOLVEBOX_RUNTIME` when set
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    if let Ok(runtime) = std::env::var("SOLVEBOX_RUNTIME") {
        config.runtime_path = Some(runtime.into());
    }
    config
}

/// A size-scored suite for a fixture
pub(crate) fn fixture_suite(source: &str, language: &str, cases: &[(&str, &str)]) -> SuiteRequest {
    SuiteRequest {
        code: fixture_source(source),
        language: language.to_string(),
        test_cases: cases
            .iter()
            .map(|(input, output)| TestCase::new(*input, *output))
            .collect(),
        scoring_mode: ScoringMode::Size,
        input_type: None,
        output_type: None,
    }
}
