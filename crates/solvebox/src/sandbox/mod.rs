//! Container sandbox wrapper
//!
//! This module drives a docker-compatible container runtime: it builds the
//! locked-down `run` invocation, keeps a warm pool of containers per
//! language, and feeds programs to them over stdin.
//!
//! Every container is single-use. Closing its stdin starts the program, and
//! the container is removed when the program exits.

use std::path::PathBuf;

use thiserror::Error;

pub use crate::sandbox::command::{SandboxAction, SandboxCommand};
pub use crate::sandbox::pool::{ProcessPool, SpawnSpec};
pub use crate::sandbox::process::PooledProcess;

mod command;
mod pool;
mod process;

/// Exit status docker-compatible runtimes use for their own failures
/// (missing image, daemon unreachable, invalid flags)
pub const RUNTIME_FAILURE_EXIT_CODE: i32 = 125;

/// Errors that occur during sandbox operations
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox unavailable for '{language}': {reason}")]
    Unavailable { language: String, reason: String },

    #[error("failed to spawn container runtime {}: {source}", path.display())]
    SpawnFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("container runtime failed with exit code {code}: {stderr}")]
    RuntimeFailed { code: i32, stderr: String },

    #[error("no sandbox configured for language '{0}'")]
    UnknownLanguage(String),

    #[error("sandbox process was already used")]
    Consumed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    /// Whether retrying the request later may succeed
    ///
    /// Infrastructure failures are transient from the caller's point of view;
    /// configuration mistakes are not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SandboxError::UnknownLanguage(_))
    }
}
