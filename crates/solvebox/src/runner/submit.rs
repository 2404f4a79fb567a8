//! Submission step
//!
//! A submission is scored only when every test case passes, and replaces
//! the stored best only when its score is strictly lower.

use tracing::{info, instrument};

use crate::runner::{RunError, Runner};
use crate::scoring::{SolutionKey, SolutionStore, StoredSolution, SubmissionOutcome, suite_score};
use crate::types::SuiteRequest;

pub const EMPTY_CODE_REASON: &str = "Code cannot be empty";
pub const FAILED_TESTS_REASON: &str = "Test cases failed, run your code to see details";

#[instrument(skip(runner, request, store), fields(language = %request.language))]
pub async fn submit(
    runner: &Runner,
    request: &SuiteRequest,
    puzzle: &str,
    user: &str,
    store: &dyn SolutionStore,
) -> Result<SubmissionOutcome, RunError> {
    if request.code.trim().is_empty() {
        return Ok(SubmissionOutcome::Rejected {
            reason: EMPTY_CODE_REASON.to_string(),
        });
    }

    let verdicts = runner.run_suite(request).await?;
    if verdicts.iter().any(|verdict| !verdict.passed) {
        return Ok(SubmissionOutcome::Rejected {
            reason: FAILED_TESTS_REASON.to_string(),
        });
    }

    let score = suite_score(request.scoring_mode, &request.code, &verdicts);
    let key = SolutionKey::new(puzzle, user, &request.language);
    let outcome = store.offer(
        key,
        StoredSolution {
            code: request.code.trim().to_string(),
            score,
            mode: request.scoring_mode,
        },
    )?;

    info!(puzzle, user, score, ?outcome, "submission scored");
    Ok(outcome)
}
