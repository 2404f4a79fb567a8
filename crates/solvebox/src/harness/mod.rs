//! Harness generation
//!
//! Wraps submitted source in language-specific boilerplate that calls the
//! user's `solve` function, times it, and prints the result between sentinel
//! lines the [parser](crate::parser) understands.
//!
//! Sentinel protocol, one marker per line:
//!
//! ```text
//! _TIME$<milliseconds per call>
//! _START_STDOUT$
//! _OUTPUT$<serialized return value>
//! _END_STDOUT$
//! ```
//!
//! The marker text is shared with the parser and must not change on one side
//! only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::harness::javascript::JavascriptHarness;
pub use crate::harness::literal::{LiteralError, coerce, parse_literal};
pub(crate) use crate::harness::literal::parse_number;
pub use crate::harness::python::PythonHarness;
use crate::types::ValueType;

mod javascript;
mod literal;
mod python;

/// Prefix of the timing line
pub const TIME_MARKER: &str = "_TIME$";
/// Opens the harness output block
pub const START_STDOUT_MARKER: &str = "_START_STDOUT$";
/// Prefix of the serialized return value, inside the output block
pub const OUTPUT_MARKER: &str = "_OUTPUT$";
/// Closes the harness output block
pub const END_STDOUT_MARKER: &str = "_END_STDOUT$";

/// Name of the function every submission must define
pub const ENTRY_FUNCTION: &str = "solve";
/// Calls measured after the warm-up call; the timing line reports their mean
pub const TIMED_ITERATIONS: u32 = 3;
/// Printed on stderr by the harness when the entry function is missing
pub const MISSING_ENTRY_MESSAGE: &str =
    "Please define a function called \"solve\" that takes input as a parameter";

/// A language-specific harness template
pub trait Harness: Send + Sync {
    /// Render a parsed literal in this language's syntax
    fn render_literal(&self, value: &Value) -> String;

    /// Produce the full program text for `source`, calling the entry function
    /// with `entry_input` (already rendered by [`render_literal`](Self::render_literal))
    fn render_program(&self, source: &str, entry_input: &str) -> String;

    /// Turn the text after `_OUTPUT$` back into a canonical JSON value
    fn normalize_output(&self, payload: &str) -> Value;
}

/// Harness templates available to language configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarnessKind {
    Javascript,
    Python,
}

impl HarnessKind {
    pub fn harness(self) -> &'static dyn Harness {
        match self {
            HarnessKind::Javascript => &JavascriptHarness,
            HarnessKind::Python => &PythonHarness,
        }
    }
}

/// Validate a raw test-case input and render it as a literal of `kind`'s language
///
/// Inputs that cannot be embedded are rejected here so they never reach a sandbox.
pub fn render_input(
    kind: HarnessKind,
    raw: &str,
    declared: Option<ValueType>,
) -> Result<String, LiteralError> {
    let value = parse_literal(raw)?;
    let value = match declared {
        Some(ty) => coerce(value, ty).ok_or_else(|| LiteralError::TypeMismatch {
            expected: ty,
            text: raw.trim().to_string(),
        })?,
        None => value,
    };
    Ok(kind.harness().render_literal(&value))
}

/// Build the program text for one test case
pub fn render(kind: HarnessKind, source: &str, entry_input: &str) -> String {
    kind.harness().render_program(source, entry_input)
}
