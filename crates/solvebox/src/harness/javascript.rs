use serde_json::Value;

use crate::harness::{
    END_STDOUT_MARKER, ENTRY_FUNCTION, Harness, MISSING_ENTRY_MESSAGE, OUTPUT_MARKER,
    START_STDOUT_MARKER, TIME_MARKER, TIMED_ITERATIONS,
};

/// Harness for Node.js, run as a CommonJS script read from stdin
#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptHarness;

impl Harness for JavascriptHarness {
    fn render_literal(&self, value: &Value) -> String {
        // JSON is a subset of JavaScript expression syntax
        value.to_string()
    }

    fn render_program(&self, source: &str, entry_input: &str) -> String {
        let divisor = f64::from(TIMED_ITERATIONS) * 1_000_000.0;
        format!(
            r#"{source}
;
if (typeof {ENTRY_FUNCTION} !== "function") {{
  console.error('{MISSING_ENTRY_MESSAGE}');
  process.exit(1);
}}
const __solvebox_input = () => ({entry_input});
{ENTRY_FUNCTION}(__solvebox_input());
const __solvebox_start = process.hrtime.bigint();
for (let __solvebox_i = 0; __solvebox_i < {TIMED_ITERATIONS}; __solvebox_i++) {{
  {ENTRY_FUNCTION}(__solvebox_input());
}}
console.log("{TIME_MARKER}" + Number(process.hrtime.bigint() - __solvebox_start) / {divisor:?});
console.log("{START_STDOUT_MARKER}");
console.log("{OUTPUT_MARKER}" + JSON.stringify({ENTRY_FUNCTION}(__solvebox_input())));
console.log("{END_STDOUT_MARKER}");
"#
        )
    }

    fn normalize_output(&self, payload: &str) -> Value {
        // JSON.stringify output, or "undefined" when solve returns nothing
        serde_json::from_str(payload.trim()).unwrap_or_else(|_| Value::String(payload.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_is_json() {
        let harness = JavascriptHarness;
        assert_eq!(harness.render_literal(&json!([1, "a", true, null])), "[1,\"a\",true,null]");
        assert_eq!(harness.render_literal(&json!("say \"hi\"")), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn program_wraps_source_and_input() {
        let program = JavascriptHarness.render_program("function solve(x){return x+1}", "5");
        assert!(program.starts_with("function solve(x){return x+1}\n"));
        assert!(program.contains("const __solvebox_input = () => (5);"));
        assert!(program.contains("typeof solve !== \"function\""));
        assert!(program.contains("process.exit(1)"));
        assert!(program.contains("/ 3000000.0"));
    }

    #[test]
    fn warm_up_call_precedes_timing() {
        let program = JavascriptHarness.render_program("", "1");
        let warm_up = program.find("solve(__solvebox_input());").unwrap();
        let start = program.find("process.hrtime.bigint();").unwrap();
        assert!(warm_up < start);
    }

    #[test]
    fn markers_are_printed_once_and_in_order() {
        let program = JavascriptHarness.render_program("", "1");
        let time = program.find("\"_TIME$\"").unwrap();
        let start = program.find("\"_START_STDOUT$\"").unwrap();
        let output = program.find("\"_OUTPUT$\"").unwrap();
        let end = program.find("\"_END_STDOUT$\"").unwrap();
        assert!(time < start && start < output && output < end);
        assert_eq!(program.matches("\"_TIME$\"").count(), 1);
    }

    #[test]
    fn normalize_output_parses_json() {
        let harness = JavascriptHarness;
        assert_eq!(harness.normalize_output("6"), json!(6));
        assert_eq!(harness.normalize_output("\"abc\""), json!("abc"));
        assert_eq!(harness.normalize_output("[true,false]"), json!([true, false]));
        assert_eq!(harness.normalize_output("undefined"), json!("undefined"));
    }
}
