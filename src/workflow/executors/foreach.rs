use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{ActionExecutor, ExecOutcome, ExecutorRegistry};
use crate::workflow::resolve::resolve_param_value;
use serde_json::{json, Map, Value};

const DEFAULT_LOOP_VARIABLE: &str = "item";

/// Iterates a resolved sequence, re-invoking a nested step template once per
/// element with the element bound to a loop variable. Per-element outputs are
/// aggregated into the parent step's output in input order; an empty input
/// yields an empty output and no nested invocation.
pub struct ForeachExecutor;

impl ActionExecutor for ForeachExecutor {
    fn kind(&self) -> &'static str {
        "foreach"
    }

    fn validate(&self, step: &Step) -> Vec<String> {
        let mut violations = Vec::new();
        if !step.params.contains_key("items") {
            violations.push(format!("step `{}`: missing required param `items`", step.id));
        }
        if let Some(name) = step.params.get("as") {
            if !name.is_string() {
                violations.push(format!("step `{}`: param `as` must be a string", step.id));
            }
        }
        match step.params.get("step") {
            Some(Value::Object(_)) => {}
            Some(_) => violations.push(format!(
                "step `{}`: param `step` must be a nested step object",
                step.id
            )),
            None => violations.push(format!("step `{}`: missing required param `step`", step.id)),
        }
        violations
    }

    // The nested template must keep its `${...}` tokens until the loop
    // variable is bound, so only `items` and `as` resolve up front.
    fn resolve_params(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>, WorkflowError> {
        let mut resolved = step.params.clone();
        if let Some(items) = step.params.get("items") {
            resolved.insert("items".to_string(), resolve_param_value(items, ctx)?);
        }
        Ok(resolved)
    }

    fn execute(
        &self,
        registry: &ExecutorRegistry,
        step: &Step,
        params: &Map<String, Value>,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let elements = sequence_of(params.get("items"));
        let loop_variable = params
            .get("as")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_LOOP_VARIABLE)
            .to_string();
        let template = nested_template(step, params)?;

        let mut results = Vec::with_capacity(elements.len());
        let mut preview = false;
        for (index, element) in elements.into_iter().enumerate() {
            let shadowed = ctx.bind_variable(&loop_variable, element);
            let outcome = registry.run_step(&template, ctx);
            ctx.restore_variable(&loop_variable, shadowed);

            match outcome {
                Ok(outcome) => {
                    preview = preview || outcome.preview;
                    results.push(outcome.output);
                }
                Err(err) if template.continue_on_error => {
                    results.push(json!({ "error": err.to_string() }));
                }
                Err(err) => {
                    return Err(WorkflowError::StepExecution {
                        step_id: step.id.clone(),
                        reason: format!("element {index}: {err}"),
                    });
                }
            }
        }

        let count = results.len();
        let output = json!({ "results": results, "count": count });
        Ok(if preview {
            ExecOutcome::preview(output)
        } else {
            ExecOutcome::live(output)
        })
    }
}

fn nested_template(step: &Step, params: &Map<String, Value>) -> Result<Step, WorkflowError> {
    let raw = params
        .get("step")
        .cloned()
        .ok_or_else(|| WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: "missing required param `step`".to_string(),
        })?;
    serde_json::from_value(raw).map_err(|err| WorkflowError::StepExecution {
        step_id: step.id.clone(),
        reason: format!("invalid nested step template: {err}"),
    })
}

// A scalar iterates as a single element; null and absent iterate as empty.
fn sequence_of(items: Option<&Value>) -> Vec<Value> {
    match items {
        Some(Value::Array(elements)) => elements.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    }
}
