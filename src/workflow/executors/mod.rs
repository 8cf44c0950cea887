mod command;
mod evaluate;
mod foreach;
mod json_file;
mod template;

pub use command::CommandExecutor;
pub use evaluate::{evaluate_expression, EvaluateExecutor};
pub use foreach::ForeachExecutor;
pub use json_file::JsonFileExecutor;
pub use template::TemplateExecutor;

use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::resolve::resolve_value;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Output of one executor invocation. `preview` marks a dry-run outcome whose
/// external effect was suppressed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecOutcome {
    pub output: Value,
    pub preview: bool,
}

impl ExecOutcome {
    pub fn live(output: Value) -> Self {
        Self {
            output,
            preview: false,
        }
    }

    pub fn preview(output: Value) -> Self {
        Self {
            output,
            preview: true,
        }
    }
}

/// One handler per action kind: structural parameter validation plus
/// execution against the run context.
pub trait ActionExecutor {
    fn kind(&self) -> &'static str;

    /// Structural violations in the step's raw (unresolved) parameters.
    fn validate(&self, step: &Step) -> Vec<String>;

    /// Resolves the step's parameters before execution. The default applies
    /// string substitution to every leaf; executors carrying nested step
    /// templates override this to defer resolution of the template body.
    fn resolve_params(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, Value>, WorkflowError> {
        match resolve_value(&Value::Object(step.params.clone()), ctx)? {
            Value::Object(map) => Ok(map),
            _ => unreachable!("resolving an object yields an object"),
        }
    }

    fn execute(
        &self,
        registry: &ExecutorRegistry,
        step: &Step,
        params: &Map<String, Value>,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError>;
}

/// Action executors keyed by kind.
pub struct ExecutorRegistry {
    executors: BTreeMap<&'static str, Box<dyn ActionExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: BTreeMap::new(),
        }
    }

    /// The full action set with the given command timeout.
    pub fn with_defaults(command_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CommandExecutor::new(command_timeout)));
        registry.register(Box::new(JsonFileExecutor));
        registry.register(Box::new(TemplateExecutor));
        registry.register(Box::new(EvaluateExecutor));
        registry.register(Box::new(ForeachExecutor));
        registry
    }

    pub fn register(&mut self, executor: Box<dyn ActionExecutor>) {
        self.executors.insert(executor.kind(), executor);
    }

    pub fn executor(&self, kind: &str) -> Option<&dyn ActionExecutor> {
        self.executors.get(kind).map(|boxed| boxed.as_ref())
    }

    pub fn is_known_action(&self, kind: &str) -> bool {
        self.executors.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.executors.keys().copied().collect()
    }

    /// Resolves and executes one step. Used directly by nested dispatch
    /// (foreach); the engine drives the same two phases separately so it can
    /// distinguish resolution failures from execution failures.
    pub fn run_step(
        &self,
        step: &Step,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let executor =
            self.executor(&step.action)
                .ok_or_else(|| WorkflowError::UnsupportedAction {
                    action: step.action.clone(),
                })?;
        let params = executor.resolve_params(step, ctx)?;
        executor.execute(self, step, &params, ctx)
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_defaults(Duration::from_secs(60))
    }
}

pub(crate) fn require_string_param(
    step: &Step,
    params: &Map<String, Value>,
    key: &str,
) -> Result<String, WorkflowError> {
    match params.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(other) => Err(WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: format!("param `{key}` must be a string, got {other}"),
        }),
        None => Err(WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: format!("missing required param `{key}`"),
        }),
    }
}

/// Validation-time check that a raw param is present and is a string. Used by
/// the structural pass, which reports every violation in one sweep.
pub(crate) fn check_string_param(step: &Step, key: &str, violations: &mut Vec<String>) {
    match step.params.get(key) {
        Some(Value::String(_)) => {}
        Some(_) => violations.push(format!(
            "step `{}`: param `{key}` must be a string",
            step.id
        )),
        None => violations.push(format!(
            "step `{}`: missing required param `{key}`",
            step.id
        )),
    }
}

/// Walks a dotted path (`$.a.b` or `a.b`) through a JSON value; array
/// segments may be numeric indices.
pub(crate) fn get_nested<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim_start_matches("$.").trim_start_matches('$');
    if trimmed.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for part in trimmed.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
