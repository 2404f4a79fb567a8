//! Code runner for solvebox
//!
//! Provides the high-level API: run a harness-wrapped program, evaluate a
//! test suite, and score a submission.

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

pub use crate::runner::execute::execute;
pub use crate::runner::submit::{EMPTY_CODE_REASON, FAILED_TESTS_REASON};
pub use crate::runner::suite::run_suite;

mod execute;
mod submit;
mod suite;

use crate::{
    config::{Config, ConfigError},
    harness::LiteralError,
    sandbox::{ProcessPool, SandboxError},
    scoring::{SolutionStore, StoreError, SubmissionOutcome},
    types::{ExecutionResult, SandboxRequest, SuiteReport, SuiteRequest, TestVerdict},
};

/// Message reported to callers when the sandbox infrastructure fails
pub const UNAVAILABLE_MESSAGE: &str = "Code execution is temporarily unavailable, please try again";

/// Errors that occur while running code
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no test cases provided")]
    NoTestCases,

    #[error("invalid input for test case {index}: {source}")]
    InvalidInput {
        index: usize,
        #[source]
        source: LiteralError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("sandbox task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("solution store error: {0}")]
    Store(#[from] StoreError),
}

impl RunError {
    /// Whether the failure lies with the infrastructure rather than the request
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            RunError::Sandbox(_) | RunError::Task(_) | RunError::Store(_)
        )
    }

    /// Message safe to show to the submitter
    ///
    /// Infrastructure details stay in the logs.
    pub fn user_message(&self) -> String {
        if self.is_infrastructure() {
            UNAVAILABLE_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// High-level runner owning a sandbox pool
///
/// Cloning is cheap; clones share the configuration and the pool.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Arc<Config>,
    pool: ProcessPool,
}

impl Runner {
    /// Create a new runner and a pool for every configured language
    pub fn new(config: Config) -> Self {
        let pool = ProcessPool::new(&config);
        Self::with_pool(config, pool)
    }

    /// Create a runner around an existing pool
    pub fn with_pool(config: Config, pool: ProcessPool) -> Self {
        Self {
            config: Arc::new(config),
            pool,
        }
    }

    /// Create a new runner with default configuration
    pub fn with_defaults() -> Self {
        Self::new(Config::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the sandbox pool
    pub fn pool(&self) -> &ProcessPool {
        &self.pool
    }

    /// Run a single request, once per repetition
    pub async fn execute(&self, request: &SandboxRequest) -> Result<Vec<ExecutionResult>, RunError> {
        execute::execute(&self.pool, &self.config, request).await
    }

    /// Evaluate every test case, in test-case order
    pub async fn run_suite(&self, request: &SuiteRequest) -> Result<Vec<TestVerdict>, RunError> {
        suite::run_suite(self, request).await
    }

    /// Evaluate a suite and fold any error into the report
    pub async fn report(&self, request: &SuiteRequest) -> SuiteReport {
        match self.run_suite(request).await {
            Ok(results) => SuiteReport::completed(results),
            Err(e) => {
                if e.is_infrastructure() {
                    warn!(error = %e, "suite failed on sandbox infrastructure");
                }
                SuiteReport::failed(e.user_message())
            }
        }
    }

    /// Evaluate a submission and store it if it is a new best
    ///
    /// Rejections (empty code, failing test cases) are outcomes, not errors.
    pub async fn submit(
        &self,
        request: &SuiteRequest,
        puzzle: &str,
        user: &str,
        store: &dyn SolutionStore,
    ) -> Result<SubmissionOutcome, RunError> {
        submit::submit(self, request, puzzle, user, store).await
    }

    /// Discard all idle sandboxes
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
