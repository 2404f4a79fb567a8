//! A library for judging untrusted puzzle solutions.
//!
//! Solvebox runs user-submitted code inside locked-down containers, checks
//! the result against test cases, and scores passing solutions by source
//! size or execution time.
//!
//! # Features
//!
//! - **Warm sandbox pool**: Pre-spawned single-use containers per language hide startup latency.
//! - **Harness generation**: User code is wrapped to call `solve`, time it, and print a delimited result.
//! - **Sentinel parsing**: Timing and return values are separated from user prints; forged timing is rejected.
//! - **Scoring**: Size or fastest-run time scores, with strictly-better replacement of stored bests.
//! - **TOML configuration**: Per-language images, commands, and resource limits.

pub use config::{Config, ConfigError, EXAMPLE_CONFIG, ImageRef, Language};
pub use harness::{Harness, HarnessKind, LiteralError};
pub use parser::{ParseError, ParsedRun, Timing, parse_run, verdict_from_runs};
pub use runner::{RunError, Runner};
pub use sandbox::{PooledProcess, ProcessPool, SandboxError};
pub use scoring::{
    MemoryStore, SolutionKey, SolutionStore, StoreError, StoredSolution, SubmissionOutcome,
    aggregate_times, size_score,
};
pub use types::{
    ExecutionResult, ResourceLimits, SandboxRequest, ScalarType, ScoringMode, SuiteReport,
    SuiteRequest, TestCase, TestVerdict, ValueType,
};

pub mod config;
pub mod harness;
pub mod parser;
pub mod runner;
pub mod sandbox;
pub mod scoring;
pub mod types;
