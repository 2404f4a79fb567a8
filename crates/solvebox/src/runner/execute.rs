//! Execution step
//!
//! Renders the harness program and runs it in one or more pooled sandboxes.

use tokio::task::JoinSet;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::harness;
use crate::runner::RunError;
use crate::sandbox::{ProcessPool, SandboxError};
use crate::types::{ExecutionResult, SandboxRequest};

/// Run a request `repetitions` times, concurrently, each in a fresh sandbox
///
/// Results come back in invocation order.
#[instrument(skip(pool, config, request), fields(language = %request.language, repetitions = request.repetitions))]
pub async fn execute(
    pool: &ProcessPool,
    config: &Config,
    request: &SandboxRequest,
) -> Result<Vec<ExecutionResult>, RunError> {
    let language = config.get_language(&request.language)?;
    let program = harness::render(language.harness, &request.source_code, &request.entry_input);
    let repetitions = request.repetitions.max(1) as usize;

    debug!(bytes = program.len(), "rendered harness program");

    let mut tasks = JoinSet::new();
    for index in 0..repetitions {
        let pool = pool.clone();
        let program = program.clone();
        let language = request.language.clone();
        tasks.spawn(async move {
            let process = pool.acquire(&language).await?;
            let result = process.run(program.as_bytes()).await?;
            Ok::<_, SandboxError>((index, result))
        });
    }

    let mut results: Vec<Option<ExecutionResult>> = vec![None; repetitions];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined??;
        results[index] = Some(result);
    }

    Ok(results.into_iter().flatten().collect())
}
