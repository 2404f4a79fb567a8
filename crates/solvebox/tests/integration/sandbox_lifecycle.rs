use std::collections::HashSet;

use solvebox::runner::Runner;
use solvebox::sandbox::ProcessPool;

use super::{fixture_suite, test_config};

#[tokio::test]
#[ignore = "requires docker"]
async fn test_pool_warms_and_hands_out_distinct_processes() {
    let config = test_config();
    let pool = ProcessPool::new(&config);
    pool.warm();

    let mut names = HashSet::new();
    let mut processes = Vec::new();
    for _ in 0..config.pool_size + 2 {
        let process = pool.acquire("python").await.expect("Failed to acquire");
        assert!(names.insert(process.name().to_string()));
        processes.push(process);
    }

    for process in processes {
        process.discard().await;
    }
    pool.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_network_is_disabled() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("network.py", "python", &[("1", "1")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    assert!(verdicts[0].error.is_some());
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_root_filesystem_is_read_only() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("write_fs.py", "python", &[("1", "1")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    assert!(
        verdicts[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Read-only file system"))
    );
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_process_limit_stops_fork_bomb() {
    let runner = Runner::new(test_config());
    let request = fixture_suite("fork_bomb.py", "python", &[("1", "64")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    runner.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_infinite_loop_times_out() {
    let mut config = test_config();
    config.default_limits.wall_time_limit = Some(2.0);
    let runner = Runner::new(config);
    let request = fixture_suite("infinite_loop.js", "javascript", &[("1", "1")]);

    let verdicts = runner.run_suite(&request).await.expect("Suite failed");

    assert!(!verdicts[0].passed);
    assert!(
        verdicts[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out"))
    );
    runner.shutdown().await;
}
