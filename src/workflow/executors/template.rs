use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{
    check_string_param, require_string_param, ActionExecutor, ExecOutcome, ExecutorRegistry,
};
use serde_json::{json, Map, Value};

/// Renders a text template against resolved variables. The substitution
/// itself happens during parameter resolution; the executor publishes the
/// rendered text under the `output` key.
pub struct TemplateExecutor;

impl ActionExecutor for TemplateExecutor {
    fn kind(&self) -> &'static str {
        "template"
    }

    fn validate(&self, step: &Step) -> Vec<String> {
        let mut violations = Vec::new();
        check_string_param(step, "text", &mut violations);
        violations
    }

    fn execute(
        &self,
        _registry: &ExecutorRegistry,
        step: &Step,
        params: &Map<String, Value>,
        _ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let rendered = require_string_param(step, params, "text")?;
        Ok(ExecOutcome::live(json!({ "output": rendered })))
    }
}
