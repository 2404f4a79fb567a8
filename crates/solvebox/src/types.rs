use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Hard memory ceiling in megabytes (swap is pinned to the same value)
    #[serde(default)]
    pub memory_limit: Option<u64>,

    /// CPU share ceiling, in cores
    #[serde(default)]
    pub cpus: Option<f64>,

    /// Maximum number of processes/threads inside the sandbox
    #[serde(default)]
    pub max_processes: Option<u32>,

    /// Wall clock time limit in seconds, enforced from the host
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Maximum captured size of stdout and stderr, each, in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,

    /// Size of a writable tmpfs mounted at /tmp in megabytes (none if unset)
    #[serde(default)]
    pub tmpfs_size: Option<u64>,
}

impl ResourceLimits {
    /// Create new resource limits with the default ceilings
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource limits with every field unset, useful as an override base
    pub fn unset() -> Self {
        Self {
            memory_limit: None,
            cpus: None,
            max_processes: None,
            wall_time_limit: None,
            max_output: None,
            tmpfs_size: None,
        }
    }

    /// Set the memory limit in megabytes
    pub fn with_memory_limit(mut self, mb: u64) -> Self {
        self.memory_limit = Some(mb);
        self
    }

    /// Set the CPU share limit
    pub fn with_cpus(mut self, cpus: f64) -> Self {
        self.cpus = Some(cpus);
        self
    }

    /// Set the maximum number of processes
    pub fn with_max_processes(mut self, count: u32) -> Self {
        self.max_processes = Some(count);
        self
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the maximum captured output size in kilobytes
    pub fn with_max_output(mut self, kb: u64) -> Self {
        self.max_output = Some(kb);
        self
    }

    /// Set the size of the /tmp tmpfs in megabytes
    pub fn with_tmpfs_size(mut self, mb: u64) -> Self {
        self.tmpfs_size = Some(mb);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            memory_limit: overrides.memory_limit.or(self.memory_limit),
            cpus: overrides.cpus.or(self.cpus),
            max_processes: overrides.max_processes.or(self.max_processes),
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            max_output: overrides.max_output.or(self.max_output),
            tmpfs_size: overrides.tmpfs_size.or(self.tmpfs_size),
        }
    }

    /// Output cap in bytes, if any
    pub fn max_output_bytes(&self) -> Option<usize> {
        self.max_output
            .map(|kb| usize::try_from(kb.saturating_mul(1024)).unwrap_or(usize::MAX))
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_limit: Some(128),
            cpus: Some(0.1),
            max_processes: Some(10),
            wall_time_limit: Some(10.0),
            max_output: Some(1024), // 1 MB
            tmpfs_size: None,
        }
    }
}

/// One request to run a harness-wrapped program in a sandbox
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRequest {
    /// User-submitted source code
    pub source_code: String,

    /// Language ID from the configuration
    pub language: String,

    /// Entry input rendered as a literal of the target language
    pub entry_input: String,

    /// Number of independent sandbox invocations (more than one averages timings)
    pub repetitions: u32,
}

/// Raw outcome of one sandbox invocation
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Values of every timing marker line found in stdout, in order
    pub elapsed_millis: Vec<f64>,

    /// Standard output with timing marker lines removed
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Host-measured wall time in seconds, including container startup
    pub wall_time: f64,

    /// Whether the host killed the process for exceeding its wall time
    pub timed_out: bool,

    /// Whether stdout or stderr was cut at the output cap
    pub truncated: bool,
}

impl ExecutionResult {
    /// Check if the invocation exited on its own with code 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// A single input/expected-output pair, both as literal text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Outcome of one test case, returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestVerdict {
    pub passed: bool,
    pub input: String,
    pub expected: String,
    pub actual: String,
    /// Whatever the user's code printed outside the harness output block
    pub program_output: String,
    pub error: Option<String>,
    pub elapsed_millis: f64,
}

impl TestVerdict {
    /// A failed verdict that never produced output
    pub fn failed(case: &TestCase, error: impl Into<String>) -> Self {
        Self {
            passed: false,
            input: case.input.clone(),
            expected: case.output.clone(),
            actual: String::new(),
            program_output: String::new(),
            error: Some(error.into()),
            elapsed_millis: 0.0,
        }
    }
}

/// How a puzzle ranks solutions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Shorter trimmed source wins
    #[default]
    #[serde(alias = "chars")]
    Size,

    /// Faster execution wins
    #[serde(alias = "runtime")]
    Time,
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "size" | "chars" => Ok(ScoringMode::Size),
            "time" | "runtime" => Ok(ScoringMode::Time),
            other => Err(format!("unknown scoring mode '{other}'")),
        }
    }
}

/// A full test-suite run requested by the surrounding application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteRequest {
    pub code: String,
    pub language: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub scoring_mode: ScoringMode,
    /// Declared type of every test-case input
    #[serde(default)]
    pub input_type: Option<ValueType>,
    /// Declared type of every expected output
    #[serde(default)]
    pub output_type: Option<ValueType>,
}

/// Overall result of a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TestVerdict>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuiteReport {
    pub fn completed(results: Vec<TestVerdict>) -> Self {
        Self {
            success: true,
            results: Some(results),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            error: Some(error.into()),
        }
    }

    /// Whether the suite ran and every verdict passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.success
            && self
                .results
                .as_ref()
                .is_some_and(|results| results.iter().all(|r| r.passed))
    }
}

/// Scalar kinds a puzzle can declare for its input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Boolean,
}

/// Declared type of a puzzle input or output, written as `number` or `number[]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Scalar(ScalarType),
    Array(ScalarType),
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (scalar, is_array) = match s.strip_suffix("[]") {
            Some(inner) => (inner, true),
            None => (s.as_str(), false),
        };
        let scalar = match scalar {
            "string" => ScalarType::String,
            "number" => ScalarType::Number,
            "boolean" | "bool" => ScalarType::Boolean,
            other => return Err(format!("unknown value type '{other}'")),
        };
        Ok(if is_array {
            ValueType::Array(scalar)
        } else {
            ValueType::Scalar(scalar)
        })
    }
}

impl TryFrom<String> for ValueType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar(scalar) => write!(f, "{scalar}"),
            ValueType::Array(scalar) => write!(f, "{scalar}[]"),
        }
    }
}
