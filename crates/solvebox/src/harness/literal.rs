//! Literal parsing for test-case inputs and expected outputs
//!
//! Puzzle authors write values loosely: JSON, single-quoted arrays, or bare
//! words that mean strings. Everything is read into a [`serde_json::Value`]
//! before it is re-rendered for a harness or compared.

use serde_json::{Number, Value};
use thiserror::Error;

use crate::types::{ScalarType, ValueType};

/// Errors that occur while reading a literal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("literal is empty")]
    Empty,

    #[error("malformed literal `{text}`: {reason}")]
    Malformed { text: String, reason: String },

    #[error("expected a {expected} literal, got `{text}`")]
    TypeMismatch { expected: ValueType, text: String },
}

/// Parse a loosely written literal
///
/// Arrays and objects must be valid JSON, optionally with single quotes.
/// Quoted text is a string, `true`/`false`/`null` and numbers are what they
/// look like, and anything else is taken as a bare string.
pub fn parse_literal(raw: &str) -> Result<Value, LiteralError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(LiteralError::Empty);
    }

    let malformed = |reason: String| LiteralError::Malformed {
        text: text.to_string(),
        reason,
    };

    if text.starts_with('[') || text.starts_with('{') {
        return match serde_json::from_str(text) {
            Ok(value) => Ok(value),
            Err(err) => serde_json::from_str(&text.replace('\'', "\""))
                .map_err(|_| malformed(err.to_string())),
        };
    }

    if text.starts_with('"') {
        return serde_json::from_str::<String>(text)
            .map(Value::String)
            .map_err(|err| malformed(err.to_string()));
    }

    if let Some(inner) = text.strip_prefix('\'') {
        return match inner.strip_suffix('\'') {
            Some(inner) => Ok(Value::String(inner.to_string())),
            None => Err(malformed("unterminated string".to_string())),
        };
    }

    Ok(match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => parse_number(text).unwrap_or_else(|| Value::String(text.to_string())),
    })
}

/// Parse text as a JSON number, accepting the float spellings JSON rejects
pub(crate) fn parse_number(text: &str) -> Option<Value> {
    if let Ok(value @ Value::Number(_)) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    // f64 parsing also accepts words like "inf" and "nan"
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Coerce a value to a declared type, or `None` if it cannot represent one
pub fn coerce(value: Value, ty: ValueType) -> Option<Value> {
    match ty {
        ValueType::Scalar(scalar) => coerce_scalar(value, scalar),
        ValueType::Array(scalar) => match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| coerce_scalar(item, scalar))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            _ => None,
        },
    }
}

fn coerce_scalar(value: Value, scalar: ScalarType) -> Option<Value> {
    match (scalar, value) {
        (ScalarType::String, Value::String(s)) => Some(Value::String(s)),
        (ScalarType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ScalarType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ScalarType::Number, Value::Number(n)) => Some(Value::Number(n)),
        (ScalarType::Number, Value::String(s)) => parse_number(s.trim()),
        (ScalarType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ScalarType::Boolean, Value::String(s)) => match s.trim() {
            "true" | "True" => Some(Value::Bool(true)),
            "false" | "False" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_literal("5").unwrap(), json!(5));
        assert_eq!(parse_literal(" -2.5 ").unwrap(), json!(-2.5));
        assert_eq!(parse_literal("1.").unwrap(), json!(1.0));
    }

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_literal("true").unwrap(), json!(true));
        assert_eq!(parse_literal("false").unwrap(), json!(false));
        assert_eq!(parse_literal("null").unwrap(), Value::Null);
    }

    #[test]
    fn bare_words_are_strings() {
        assert_eq!(parse_literal("hello world").unwrap(), json!("hello world"));
        assert_eq!(parse_literal("5abc").unwrap(), json!("5abc"));
        assert_eq!(parse_literal("inf").unwrap(), json!("inf"));
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(parse_literal("\"a\\\"b\"").unwrap(), json!("a\"b"));
        assert_eq!(parse_literal("'abc'").unwrap(), json!("abc"));
        assert!(matches!(
            parse_literal("\"abc"),
            Err(LiteralError::Malformed { .. })
        ));
        assert!(matches!(
            parse_literal("'abc"),
            Err(LiteralError::Malformed { .. })
        ));
    }

    #[test]
    fn arrays_accept_single_quotes() {
        assert_eq!(parse_literal("['a', 'b']").unwrap(), json!(["a", "b"]));
        assert_eq!(parse_literal("[1, [2, 3]]").unwrap(), json!([1, [2, 3]]));
    }

    #[test]
    fn objects_parse_as_json() {
        assert_eq!(parse_literal("{\"a\": 1}").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!(parse_literal("   "), Err(LiteralError::Empty));
    }

    #[test]
    fn coerce_scalars() {
        let number = ValueType::Scalar(ScalarType::Number);
        let string = ValueType::Scalar(ScalarType::String);
        let boolean = ValueType::Scalar(ScalarType::Boolean);

        assert_eq!(coerce(json!("6"), number), Some(json!(6)));
        assert_eq!(coerce(json!("six"), number), None);
        assert_eq!(coerce(json!(6), string), Some(json!("6")));
        assert_eq!(coerce(json!("True"), boolean), Some(json!(true)));
        assert_eq!(coerce(json!(1), boolean), None);
        assert_eq!(coerce(json!([1]), number), None);
    }

    #[test]
    fn coerce_arrays_element_wise() {
        let numbers = ValueType::Array(ScalarType::Number);
        assert_eq!(coerce(json!(["1", 2]), numbers), Some(json!([1, 2])));
        assert_eq!(coerce(json!(["1", "x"]), numbers), None);
        assert_eq!(coerce(json!(1), numbers), None);
    }
}
