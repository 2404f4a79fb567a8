//! Sentinel protocol parsing and verdicts
//!
//! Turns raw sandbox output into a [`TestVerdict`]. See the
//! [harness](crate::harness) module for the protocol itself.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::harness::{
    END_STDOUT_MARKER, Harness, OUTPUT_MARKER, START_STDOUT_MARKER, TIME_MARKER, coerce,
    parse_literal, parse_number,
};
use crate::scoring::{aggregate_times, round_millis};
use crate::types::{ExecutionResult, TestCase, TestVerdict, ValueType};

/// Elapsed time reported for a run whose timing line is missing
pub const MISSING_TIME_MILLIS: f64 = 9999.0;

/// Note left on a verdict whose runs reported no timing
pub const MISSING_TIME_NOTE: &str = "No timing was reported; elapsed time recorded as 9999 ms";

/// Errors that reject a run outright
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("timing output was tampered with: {markers} timing markers in one run")]
    Tampered { markers: usize },
}

/// Timing reported by the harness for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Exactly one well-formed timing line
    Measured(f64),
    /// No usable timing line; scored as [`MISSING_TIME_MILLIS`]
    Missing,
}

impl Timing {
    pub fn millis(self) -> f64 {
        match self {
            Timing::Measured(ms) => ms,
            Timing::Missing => MISSING_TIME_MILLIS,
        }
    }

    pub fn is_trusted(self) -> bool {
        matches!(self, Timing::Measured(_))
    }
}

/// One run's output, split along the sentinel lines
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRun {
    pub timing: Timing,
    /// Lines the program printed outside the harness output block
    pub program_output: String,
    /// Text after the last `_OUTPUT$` inside the block
    pub payload: Option<String>,
}

/// Remove timing lines from raw stdout
///
/// Returns the value of every timing line in order, with unparseable values
/// as NaN, and the remaining text unchanged.
pub fn split_timing(stdout: &str) -> (Vec<f64>, String) {
    let mut timings = Vec::new();
    let mut rest = String::with_capacity(stdout.len());

    for line in stdout.split_inclusive('\n') {
        match line.trim_end_matches(['\r', '\n']).strip_prefix(TIME_MARKER) {
            Some(value) => timings.push(value.trim().parse().unwrap_or(f64::NAN)),
            None => rest.push_str(line),
        }
    }

    (timings, rest)
}

/// Split a run into timing, visible output, and the harness payload
///
/// More than one timing line rejects the run. Only the last
/// `_START_STDOUT$` block counts; an unterminated block runs to the end of
/// the output.
pub fn parse_run(result: &ExecutionResult) -> Result<ParsedRun, ParseError> {
    let markers = result.elapsed_millis.len();
    if markers > 1 {
        warn!(markers, "rejecting run with multiple timing markers");
        return Err(ParseError::Tampered { markers });
    }

    let timing = match result.elapsed_millis.first() {
        Some(&ms) if ms.is_finite() => Timing::Measured(ms.max(0.0)),
        Some(&ms) => {
            warn!(value = ms, "run produced an unreadable timing marker");
            Timing::Missing
        }
        None => {
            warn!("run produced no timing marker");
            Timing::Missing
        }
    };

    let lines: Vec<&str> = result
        .stdout
        .lines()
        .filter(|line| !line.starts_with(TIME_MARKER))
        .collect();

    let block_start = lines.iter().rposition(|line| *line == START_STDOUT_MARKER);
    let (visible, payload) = match block_start {
        None => (lines, None),
        Some(start) => {
            let end = lines[start..]
                .iter()
                .position(|line| *line == END_STDOUT_MARKER)
                .map_or(lines.len(), |offset| start + offset);

            let payload = lines[start + 1..end]
                .iter()
                .rev()
                .find_map(|line| line.strip_prefix(OUTPUT_MARKER))
                .map(str::to_string);

            let mut visible = lines[..start].to_vec();
            visible.extend_from_slice(lines.get(end + 1..).unwrap_or_default());
            (visible, payload)
        }
    };

    Ok(ParsedRun {
        timing,
        program_output: visible.join("\n").trim_end().to_string(),
        payload,
    })
}

/// Tolerant structural equality between an actual and an expected value
///
/// Scalars compare as unquoted text, numbers numerically (also against
/// numeric text), and arrays and objects element-wise.
pub fn outputs_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| outputs_match(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| outputs_match(a, b)))
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match parse_number(s.trim()) {
                Some(Value::Number(parsed)) => parsed.as_f64() == n.as_f64(),
                _ => false,
            }
        }
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        (a, b) => scalar_text(a) == scalar_text(b),
    }
}

/// Display form of a value: strings without quotes, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Parse an expected output the way puzzle authors write it
pub fn parse_expected(raw: &str, output_type: Option<ValueType>) -> Value {
    let value = parse_literal(raw).unwrap_or_else(|_| Value::String(raw.trim().to_string()));
    apply_type(value, output_type)
}

fn apply_type(value: Value, output_type: Option<ValueType>) -> Value {
    match output_type {
        Some(ty) => coerce(value.clone(), ty).unwrap_or(value),
        None => value,
    }
}

/// Judge a test case from one or more runs of the same program
///
/// The first run decides correctness. Every run must succeed and carry
/// untampered timing; elapsed time is aggregated over all runs.
pub fn verdict_from_runs(
    case: &TestCase,
    harness: &dyn Harness,
    runs: &[ExecutionResult],
    output_type: Option<ValueType>,
) -> TestVerdict {
    let Some(first) = runs.first() else {
        return TestVerdict::failed(case, "No runs were executed");
    };

    let mut parsed = Vec::with_capacity(runs.len());
    for run in runs {
        if let Some(verdict) = failed_run(case, run) {
            return verdict;
        }
        match parse_run(run) {
            Ok(run) => parsed.push(run),
            Err(e) => {
                return TestVerdict::failed(
                    case,
                    format!("Execution was rejected by the sandbox: {e}"),
                );
            }
        }
    }
    let Some(head) = parsed.first() else {
        return TestVerdict::failed(case, "No runs were executed");
    };

    let millis: Vec<f64> = parsed.iter().map(|run| run.timing.millis()).collect();
    let elapsed_millis = round_millis(aggregate_times(&millis).unwrap_or(MISSING_TIME_MILLIS));

    let untrusted = parsed.iter().any(|run| !run.timing.is_trusted());
    let mut verdict = TestVerdict {
        passed: false,
        input: case.input.clone(),
        expected: case.output.clone(),
        actual: String::new(),
        program_output: head.program_output.clone(),
        error: untrusted.then(|| MISSING_TIME_NOTE.to_string()),
        elapsed_millis,
    };

    let Some(payload) = head.payload.as_deref() else {
        verdict.error = Some(format!(
            "No result was produced (exit code {})",
            exit_code_text(first)
        ));
        return verdict;
    };

    let actual = apply_type(harness.normalize_output(payload), output_type);
    let expected = parse_expected(&case.output, output_type);

    verdict.actual = display_value(&actual);
    verdict.passed = outputs_match(&actual, &expected);
    verdict
}

/// A verdict for a run that did not exit cleanly, carrying what it printed
fn failed_run(case: &TestCase, run: &ExecutionResult) -> Option<TestVerdict> {
    let error = if run.timed_out {
        format!("Execution timed out after {:.1}s", run.wall_time)
    } else if !run.stderr.trim().is_empty() {
        run.stderr.trim().to_string()
    } else if run.exit_code != Some(0) {
        format!("Process exited with code {}", exit_code_text(run))
    } else {
        return None;
    };

    let mut verdict = TestVerdict::failed(case, error);
    if let Ok(parsed) = parse_run(run) {
        verdict.program_output = parsed.program_output;
    }
    Some(verdict)
}

fn exit_code_text(run: &ExecutionResult) -> String {
    run.exit_code
        .map_or_else(|| "none".to_string(), |code| code.to_string())
}
