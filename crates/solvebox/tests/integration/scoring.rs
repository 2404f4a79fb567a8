use solvebox::runner::Runner;
use solvebox::scoring::{MemoryStore, SolutionKey, SolutionStore, SubmissionOutcome};
use solvebox::types::ScoringMode;

use super::{fixture_suite, test_config};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_forged_timing_is_rejected() {
    let runner = Runner::new(test_config());
    let mut request = fixture_suite("forge_timing.js", "javascript", &[("5", "6")]);
    request.scoring_mode = ScoringMode::Time;

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    assert!(
        verdicts[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("tampered"))
    );
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_time_submission_is_stored() {
    let runner = Runner::new(test_config());
    let store = MemoryStore::new();
    let mut request = fixture_suite("add_one.py", "python", &[("5", "6"), ("10", "11")]);
    request.scoring_mode = ScoringMode::Time;

    let outcome = runner
        .submit(&request, "add-one", "ada", &store)
        .await
        .expect("Submission failed");

    let SubmissionOutcome::Stored { score, previous } = outcome else {
        panic!("expected a stored solution, got {outcome:?}");
    };
    assert!(score >= 0.0);
    assert_eq!(previous, None);

    let key = SolutionKey::new("add-one", "ada", "python");
    let stored = store.best(&key).unwrap().expect("solution not stored");
    assert_eq!(stored.code, request.code.trim());
    runner.shutdown().await;
}
