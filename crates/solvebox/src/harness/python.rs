use serde_json::Value;

use crate::harness::literal::parse_number;
use crate::harness::{
    END_STDOUT_MARKER, ENTRY_FUNCTION, Harness, MISSING_ENTRY_MESSAGE, OUTPUT_MARKER,
    START_STDOUT_MARKER, TIME_MARKER, TIMED_ITERATIONS,
};

/// Harness for CPython, run as a script read from stdin
///
/// The return value is printed with `repr()`, so strings keep their quotes and
/// can be told apart from numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonHarness;

impl Harness for PythonHarness {
    fn render_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            // JSON number and string escapes are valid Python
            Value::Number(_) | Value::String(_) => value.to_string(),
            Value::Array(items) => {
                let items: Vec<_> = items.iter().map(|item| self.render_literal(item)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(map) => {
                let entries: Vec<_> = map
                    .iter()
                    .map(|(key, item)| {
                        format!("{}: {}", Value::from(key.as_str()), self.render_literal(item))
                    })
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    fn render_program(&self, source: &str, entry_input: &str) -> String {
        let divisor = TIMED_ITERATIONS * 1_000_000;
        format!(
            r#"import sys as __solvebox_sys
import time as __solvebox_time

true, false, null = True, False, None

{source}

if not callable(globals().get("{ENTRY_FUNCTION}")):
    print('{MISSING_ENTRY_MESSAGE}', file=__solvebox_sys.stderr)
    __solvebox_sys.exit(1)

def __solvebox_input():
    return {entry_input}

{ENTRY_FUNCTION}(__solvebox_input())
__solvebox_start = __solvebox_time.perf_counter_ns()
for __solvebox_i in range({TIMED_ITERATIONS}):
    {ENTRY_FUNCTION}(__solvebox_input())
print("{TIME_MARKER}" + str((__solvebox_time.perf_counter_ns() - __solvebox_start) / {divisor}))
print("{START_STDOUT_MARKER}")
print("{OUTPUT_MARKER}" + repr({ENTRY_FUNCTION}(__solvebox_input())))
print("{END_STDOUT_MARKER}")
"#
        )
    }

    fn normalize_output(&self, payload: &str) -> Value {
        let payload = payload.trim();
        repr_to_json(payload)
            .and_then(|json| serde_json::from_str(&json).ok())
            .or_else(|| parse_number(payload))
            .unwrap_or_else(|| Value::String(payload.to_string()))
    }
}

/// Rewrite a Python `repr()` of plain data as JSON text
///
/// Handles strings in either quote style, `True`/`False`/`None`, lists,
/// tuples, and dicts. Returns `None` for anything else.
fn repr_to_json(repr: &str) -> Option<String> {
    let mut json = String::with_capacity(repr.len());
    let mut chars = repr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                let decoded = decode_string(&mut chars, c)?;
                json.push_str(&Value::String(decoded).to_string());
            }
            '(' => json.push('['),
            ')' => {
                // A one-element tuple reprs as "(x,)"
                if json.ends_with(',') {
                    json.pop();
                }
                json.push(']');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let in_number = json.ends_with(|p: char| p.is_ascii_digit() || p == '.');
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_' || next == '.') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                match word.as_str() {
                    "True" => json.push_str("true"),
                    "False" => json.push_str("false"),
                    "None" => json.push_str("null"),
                    // exponent of a float such as 1e+20
                    _ if in_number => json.push_str(&word),
                    _ => return None,
                }
            }
            c => json.push(c),
        }
    }

    Some(json)
}

/// Decode the body of a Python string literal after its opening quote
fn decode_string(chars: &mut impl Iterator<Item = char>, quote: char) -> Option<String> {
    let mut out = String::new();
    loop {
        match chars.next()? {
            c if c == quote => return Some(out),
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '0' => out.push('\0'),
                'x' => out.push(decode_hex(chars, 2)?),
                'u' => out.push(decode_hex(chars, 4)?),
                'U' => out.push(decode_hex(chars, 8)?),
                other @ ('\\' | '\'' | '"') => out.push(other),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            c => out.push(c),
        }
    }
}

fn decode_hex(chars: &mut impl Iterator<Item = char>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}
