use crate::shared::ids::validate_identifier_value;
use crate::workflow::document::{Step, Workflow};
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::ExecutorRegistry;
use serde_json::Value;
use std::collections::BTreeSet;

/// Structural validation of a workflow document before any execution,
/// against the action set of the registry that will run it. Collects every
/// violation found so the caller sees the complete set of problems in one
/// pass, then fails with a single validation error.
pub fn validate_workflow(
    workflow: &Workflow,
    registry: &ExecutorRegistry,
) -> Result<(), WorkflowError> {
    let mut violations = Vec::new();

    if workflow.steps.is_empty() {
        violations.push("workflow has no steps".to_string());
    }

    let mut seen = BTreeSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.id.as_str()) {
            violations.push(format!("duplicate step id `{}`", step.id));
        }
    }

    for step in &workflow.steps {
        collect_step_violations(registry, step, &mut violations);
    }

    if let Some(on_complete) = &workflow.on_complete {
        if on_complete.action != "return" {
            violations.push(format!(
                "on_complete action must be `return`, got `{}`",
                on_complete.action
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation { violations })
    }
}

fn collect_step_violations(
    registry: &ExecutorRegistry,
    step: &Step,
    violations: &mut Vec<String>,
) {
    if let Err(reason) = validate_identifier_value("step id", &step.id) {
        violations.push(format!("step `{}`: {reason}", step.id));
    }

    match registry.executor(&step.action) {
        None => violations.push(format!(
            "step `{}`: unknown action kind `{}`",
            step.id, step.action
        )),
        Some(executor) => {
            violations.extend(executor.validate(step));
            if step.action == "foreach" {
                collect_nested_template_violations(registry, step, violations);
            }
        }
    }

    if let Some(condition) = &step.condition {
        if condition.trim().is_empty() {
            violations.push(format!("step `{}`: condition must be non-empty", step.id));
        }
    }

    for sub_step in &step.on_error {
        collect_step_violations(registry, sub_step, violations);
    }
}

fn collect_nested_template_violations(
    registry: &ExecutorRegistry,
    step: &Step,
    violations: &mut Vec<String>,
) {
    let Some(raw @ Value::Object(_)) = step.params.get("step") else {
        // Shape violations already reported by the foreach executor.
        return;
    };
    match serde_json::from_value::<Step>(raw.clone()) {
        Ok(nested) => collect_step_violations(registry, &nested, violations),
        Err(err) => violations.push(format!(
            "step `{}`: invalid nested step template: {err}",
            step.id
        )),
    }
}
