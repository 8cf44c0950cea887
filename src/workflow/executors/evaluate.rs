use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{
    check_string_param, require_string_param, ActionExecutor, ExecOutcome, ExecutorRegistry,
};
use serde_json::{json, Map, Value};

/// Evaluates a boolean or comparison expression against already-resolved
/// variables. Used both as a step action and for step condition guards.
pub struct EvaluateExecutor;

impl ActionExecutor for EvaluateExecutor {
    fn kind(&self) -> &'static str {
        "evaluate"
    }

    fn validate(&self, step: &Step) -> Vec<String> {
        let mut violations = Vec::new();
        check_string_param(step, "expression", &mut violations);
        violations
    }

    fn execute(
        &self,
        _registry: &ExecutorRegistry,
        step: &Step,
        params: &Map<String, Value>,
        _ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let expression = require_string_param(step, params, "expression")?;
        let result = evaluate_expression(&expression)?;
        Ok(ExecOutcome::live(json!({ "result": result })))
    }
}

// Comparison operators in match order; two-character forms first so `>=`
// never parses as `>` followed by `=`.
const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Evaluates a resolved expression: a bare boolean literal or a single
/// binary comparison. Numeric operands compare numerically, otherwise
/// `==`/`!=` compare as trimmed strings; ordering over non-numeric operands
/// is unsupported.
pub fn evaluate_expression(expression: &str) -> Result<bool, WorkflowError> {
    let trimmed = expression.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" => return Ok(true),
        "false" | "0" => return Ok(false),
        _ => {}
    }

    for operator in OPERATORS {
        let Some((left, right)) = trimmed.split_once(operator) else {
            continue;
        };
        let left = left.trim();
        let right = right.trim();
        let numeric = left.parse::<f64>().ok().zip(right.parse::<f64>().ok());
        return match (operator, numeric) {
            ("==", Some((a, b))) => Ok(a == b),
            ("!=", Some((a, b))) => Ok(a != b),
            (">=", Some((a, b))) => Ok(a >= b),
            ("<=", Some((a, b))) => Ok(a <= b),
            (">", Some((a, b))) => Ok(a > b),
            ("<", Some((a, b))) => Ok(a < b),
            ("==", None) => Ok(left == right),
            ("!=", None) => Ok(left != right),
            (_, None) => Err(WorkflowError::UnsupportedExpression {
                expression: expression.to_string(),
                reason: format!("operator `{operator}` requires numeric operands"),
            }),
            _ => unreachable!("operator list is exhaustive"),
        };
    }

    Err(WorkflowError::UnsupportedExpression {
        expression: expression.to_string(),
        reason: "expected a boolean literal or a binary comparison".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_literals_evaluate_directly() {
        assert!(evaluate_expression("true").expect("true"));
        assert!(evaluate_expression(" TRUE ").expect("case-insensitive"));
        assert!(!evaluate_expression("false").expect("false"));
        assert!(!evaluate_expression("0").expect("zero"));
    }

    #[test]
    fn numeric_and_string_comparisons() {
        assert!(evaluate_expression("3 > 2").expect("gt"));
        assert!(evaluate_expression("2.5 <= 2.5").expect("le"));
        assert!(evaluate_expression("10 != 3").expect("ne"));
        assert!(evaluate_expression("westeurope == westeurope").expect("string eq"));
        assert!(evaluate_expression("a != b").expect("string ne"));
    }

    #[test]
    fn ordering_over_strings_and_unknown_forms_are_unsupported() {
        let err = evaluate_expression("abc > abd").expect_err("string ordering");
        assert!(matches!(err, WorkflowError::UnsupportedExpression { .. }));
        let err = evaluate_expression("not (x)").expect_err("unknown form");
        assert!(matches!(err, WorkflowError::UnsupportedExpression { .. }));
    }

    #[test]
    fn two_character_operators_win_over_prefixes() {
        assert!(evaluate_expression("3 >= 3").expect("ge"));
        assert!(!evaluate_expression("2 >= 3").expect("ge false"));
    }
}
