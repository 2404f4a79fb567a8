use solvebox::runner::Runner;
use solvebox::types::{SandboxRequest, ScalarType, ValueType};

use super::{fixture_source, fixture_suite, test_config};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_javascript_add_one() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("add_one.js", "javascript", &[("5", "6"), ("-1", "0")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert_eq!(verdicts.len(), 2);
    assert!(verdicts[0].passed, "{:?}", verdicts[0]);
    assert_eq!(verdicts[0].actual, "6");
    assert_eq!(verdicts[0].error, None);
    assert!(verdicts[0].elapsed_millis >= 0.0);
    assert!(verdicts[1].passed, "{:?}", verdicts[1]);

    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_python_add_one() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("add_one.py", "python", &[("5", "6"), ("1.5", "2.5")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(verdicts.iter().all(|v| v.passed), "{verdicts:?}");
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_missing_entry_function() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("missing_solve.js", "javascript", &[("5", "6")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    let error = verdicts[0].error.as_deref().expect("missing error");
    assert!(error.contains("Please define a function called \"solve\""));
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_program_output_and_typed_result() {
    let runner = Runner::new(test_config());
    let mut request = fixture_suite("chatty.py", "python", &[("[1, 2, 3]", "[false, true, false]")]);
    request.input_type = Some(ValueType::Array(ScalarType::Number));
    request.output_type = Some(ValueType::Array(ScalarType::Boolean));

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(verdicts[0].passed, "{:?}", verdicts[0]);
    assert!(verdicts[0].program_output.contains("working on [1, 2, 3]"));
    assert_eq!(verdicts[0].actual, "[false,true,false]");
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_execute_repetitions() {
    let runner = Runner::new(test_config());
    let request = SandboxRequest {
        source_code: fixture_source("add_one.js"),
        language: "javascript".to_string(),
        entry_input: "41".to_string(),
        repetitions: 3,
    };

    let results = runner.execute(&request).await.expect("Execution failed");

    assert_eq!(results.len(), 3);
    for result in &results {
        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.elapsed_millis.len(), 1);
        assert!(result.stdout.contains("_OUTPUT$42"));
    }
    runner.shutdown().await;
}
