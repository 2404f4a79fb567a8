//! Scores and best-solution bookkeeping
//!
//! Lower is better in both modes: fewer characters of trimmed source, or
//! fewer milliseconds summed over every test case.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{ScoringMode, TestVerdict};

/// Timing samples kept per test case, fastest first
pub const KEPT_FASTEST_RUNS: usize = 2;

/// Average the fastest runs of one test case
///
/// Samples are sorted ascending and at most [`KEPT_FASTEST_RUNS`] are kept,
/// so with three runs the slowest is discarded. Non-finite samples are
/// ignored. Returns `None` when nothing usable remains.
pub fn aggregate_times(samples: &[f64]) -> Option<f64> {
    let mut samples: Vec<f64> = samples.iter().copied().filter(|t| t.is_finite()).collect();
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    samples.truncate(KEPT_FASTEST_RUNS);

    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Character count of the trimmed source
pub fn size_score(source: &str) -> usize {
    source.trim().chars().count()
}

/// Round milliseconds to four decimal places for reporting
pub fn round_millis(millis: f64) -> f64 {
    (millis * 10_000.0).round() / 10_000.0
}

/// Score a fully passing suite
pub fn suite_score(mode: ScoringMode, source: &str, verdicts: &[TestVerdict]) -> f64 {
    match mode {
        ScoringMode::Size => size_score(source) as f64,
        ScoringMode::Time => round_millis(verdicts.iter().map(|v| v.elapsed_millis).sum()),
    }
}

/// Whether `candidate` should replace `existing`
///
/// Only a strictly lower score wins; ties keep the stored solution.
pub fn is_improvement(candidate: f64, existing: Option<f64>) -> bool {
    match existing {
        None => !candidate.is_nan(),
        Some(existing) => candidate < existing,
    }
}

/// Identifies one best-solution slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolutionKey {
    pub puzzle: String,
    pub user: String,
    pub language: String,
}

impl SolutionKey {
    pub fn new(
        puzzle: impl Into<String>,
        user: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            puzzle: puzzle.into(),
            user: user.into(),
            language: language.into(),
        }
    }
}

/// A stored best solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSolution {
    /// Trimmed source code
    pub code: String,
    pub score: f64,
    pub mode: ScoringMode,
}

/// Result of offering a solution to a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SubmissionOutcome {
    /// The solution is now the stored best
    #[serde(rename_all = "camelCase")]
    Stored { score: f64, previous: Option<f64> },

    /// A solution at least as good is already stored
    #[serde(rename_all = "camelCase")]
    NotImproved { score: f64, best: f64 },

    /// The solution was not scored
    Rejected { reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid solution store: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for best solutions
pub trait SolutionStore: Send + Sync {
    /// Current best for `key`
    fn best(&self, key: &SolutionKey) -> Result<Option<StoredSolution>, StoreError>;

    /// Store `candidate` if it improves on the current best, atomically
    fn offer(
        &self,
        key: SolutionKey,
        candidate: StoredSolution,
    ) -> Result<SubmissionOutcome, StoreError>;
}

/// In-memory store that can be saved to and loaded from a JSON file
#[derive(Debug, Default)]
pub struct MemoryStore {
    solutions: Mutex<BTreeMap<SolutionKey, StoredSolution>>,
}

/// On-disk shape of one stored solution
#[derive(Serialize, Deserialize)]
struct Entry {
    #[serde(flatten)]
    key: SolutionKey,
    #[serde(flatten)]
    solution: StoredSolution,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store saved with [`save`](Self::save); a missing file is empty
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no solution store yet");
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };

        let entries: Vec<Entry> = serde_json::from_str(&content)?;
        let solutions = entries
            .into_iter()
            .map(|entry| (entry.key, entry.solution))
            .collect();

        Ok(Self {
            solutions: Mutex::new(solutions),
        })
    }

    /// Write every stored solution as a JSON array
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let entries: Vec<Entry> = self
            .lock()
            .iter()
            .map(|(key, solution)| Entry {
                key: key.clone(),
                solution: solution.clone(),
            })
            .collect();

        std::fs::write(path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SolutionKey, StoredSolution>> {
        self.solutions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SolutionStore for MemoryStore {
    fn best(&self, key: &SolutionKey) -> Result<Option<StoredSolution>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn offer(
        &self,
        key: SolutionKey,
        candidate: StoredSolution,
    ) -> Result<SubmissionOutcome, StoreError> {
        let mut solutions = self.lock();
        let previous = solutions.get(&key).map(|s| s.score);
        let score = candidate.score;

        if !is_improvement(score, previous) {
            return Ok(SubmissionOutcome::NotImproved {
                score,
                best: previous.unwrap_or(f64::NAN),
            });
        }

        debug!(?key, score, ?previous, "storing improved solution");
        solutions.insert(key, candidate);
        Ok(SubmissionOutcome::Stored { score, previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(code: &str, score: f64) -> StoredSolution {
        StoredSolution {
            code: code.to_string(),
            score,
            mode: ScoringMode::Size,
        }
    }

    fn key() -> SolutionKey {
        SolutionKey::new("fizzbuzz", "ada", "python")
    }

    #[test]
    fn aggregate_drops_slowest_of_three() {
        let mean = aggregate_times(&[12.1, 9.8, 40.0]).unwrap();
        assert!((mean - 10.95).abs() < 1e-9);
    }

    #[test]
    fn aggregate_keeps_fastest_two() {
        assert_eq!(aggregate_times(&[5.0, 1.0, 3.0, 2.0]), Some(1.5));
        assert_eq!(aggregate_times(&[4.0, 2.0]), Some(3.0));
        assert_eq!(aggregate_times(&[7.5]), Some(7.5));
    }

    #[test]
    fn aggregate_ignores_non_finite() {
        assert_eq!(aggregate_times(&[f64::NAN, 2.0, f64::INFINITY]), Some(2.0));
        assert_eq!(aggregate_times(&[f64::NAN]), None);
        assert_eq!(aggregate_times(&[]), None);
    }

    #[test]
    fn size_score_trims_and_counts_chars() {
        assert_eq!(size_score("  solve=x=>x  \n"), 10);
        assert_eq!(size_score("λ"), 1);
        assert_eq!(size_score("   "), 0);
    }

    #[test]
    fn round_millis_four_places() {
        assert_eq!(round_millis(10.123_456), 10.1235);
        assert_eq!(round_millis(0.0), 0.0);
    }

    #[test]
    fn suite_score_by_mode() {
        let verdict = |ms: f64| TestVerdict {
            passed: true,
            input: "1".into(),
            expected: "1".into(),
            actual: "1".into(),
            program_output: String::new(),
            error: None,
            elapsed_millis: ms,
        };
        let verdicts = [verdict(1.25), verdict(2.5)];
        assert_eq!(suite_score(ScoringMode::Time, "ignored", &verdicts), 3.75);
        assert_eq!(suite_score(ScoringMode::Size, " abc ", &verdicts), 3.0);
    }

    #[test]
    fn shorter_solution_replaces_stored_best() {
        let store = MemoryStore::new();
        store.offer(key(), solution(&"x".repeat(50), 50.0)).unwrap();

        let outcome = store.offer(key(), solution(&"y".repeat(42), 42.0)).unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::Stored {
                score: 42.0,
                previous: Some(50.0)
            }
        );
        assert_eq!(store.best(&key()).unwrap().unwrap().score, 42.0);
    }

    #[test]
    fn ties_keep_existing_solution() {
        let store = MemoryStore::new();
        store.offer(key(), solution("first", 5.0)).unwrap();

        let outcome = store.offer(key(), solution("other", 5.0)).unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::NotImproved {
                score: 5.0,
                best: 5.0
            }
        );
        assert_eq!(store.best(&key()).unwrap().unwrap().code, "first");
    }

    #[test]
    fn keys_are_independent() {
        let store = MemoryStore::new();
        store.offer(key(), solution("a", 5.0)).unwrap();
        let other = SolutionKey::new("fizzbuzz", "ada", "javascript");
        assert!(matches!(
            store.offer(other, solution("b", 9.0)).unwrap(),
            SubmissionOutcome::Stored { previous: None, .. }
        ));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "solvebox-store-test-{}.json",
            std::process::id()
        ));
        let store = MemoryStore::new();
        store.offer(key(), solution("print(1)", 8.0)).unwrap();
        store.save(&path).unwrap();

        let loaded = MemoryStore::load(&path).unwrap();
        assert_eq!(loaded.best(&key()).unwrap(), Some(solution("print(1)", 8.0)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_missing_file_is_empty() {
        let store = MemoryStore::load("/nonexistent/solvebox-store.json").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(SubmissionOutcome::NotImproved {
            score: 3.0,
            best: 2.0,
        })
        .unwrap();
        assert_eq!(json["status"], "notImproved");
        assert_eq!(json["best"], 2.0);
    }
}
