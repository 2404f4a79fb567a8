//! Test-suite evaluation
//!
//! Every test case runs concurrently under one suite deadline. Cases still
//! running at the deadline are aborted and reported as timed out.

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::harness::render_input;
use crate::parser::verdict_from_runs;
use crate::runner::{RunError, Runner};
use crate::types::{SandboxRequest, ScoringMode, SuiteRequest, TestVerdict};

/// Evaluate every test case of `request`
///
/// All inputs are validated before any sandbox is touched. A sandbox
/// failure in any case fails the whole suite; user-code failures only fail
/// their own verdict.
#[instrument(skip(runner, request), fields(language = %request.language, cases = request.test_cases.len()))]
pub async fn run_suite(
    runner: &Runner,
    request: &SuiteRequest,
) -> Result<Vec<TestVerdict>, RunError> {
    if request.test_cases.is_empty() {
        return Err(RunError::NoTestCases);
    }

    let config = runner.config();
    let kind = config.get_language(&request.language)?.harness;

    let inputs = request
        .test_cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            render_input(kind, &case.input, request.input_type)
                .map_err(|source| RunError::InvalidInput { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let repetitions = match request.scoring_mode {
        ScoringMode::Size => 1,
        ScoringMode::Time => config.bench_runs,
    };

    let mut tasks = JoinSet::new();
    for (index, (case, entry_input)) in request.test_cases.iter().zip(inputs).enumerate() {
        let runner = runner.clone();
        let case = case.clone();
        let output_type = request.output_type;
        let sandbox_request = SandboxRequest {
            source_code: request.code.clone(),
            language: request.language.clone(),
            entry_input,
            repetitions,
        };

        tasks.spawn(async move {
            let runs = runner.execute(&sandbox_request).await?;
            let verdict = verdict_from_runs(&case, kind.harness(), &runs, output_type);
            Ok::<_, RunError>((index, verdict))
        });
    }

    let timeout = config.suite_timeout();
    let deadline = Instant::now() + timeout;
    let mut verdicts: Vec<Option<TestVerdict>> = vec![None; request.test_cases.len()];

    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(joined)) => {
                let (index, verdict) = joined??;
                debug!(index, passed = verdict.passed, "test case finished");
                verdicts[index] = Some(verdict);
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    remaining = tasks.len(),
                    "suite deadline reached, aborting remaining test cases"
                );
                tasks.abort_all();
                break;
            }
        }
    }

    Ok(verdicts
        .into_iter()
        .zip(&request.test_cases)
        .map(|(verdict, case)| {
            verdict.unwrap_or_else(|| {
                TestVerdict::failed(
                    case,
                    format!("Test suite timed out after {}s", timeout.as_secs_f64()),
                )
            })
        })
        .collect())
}
