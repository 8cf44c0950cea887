use crate::workflow::error::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Outcome of one step, kept in declared order inside the run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the step ran under dry-run and its external effect was
    /// suppressed in favour of a preview output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub preview: bool,
    /// Marks output that must be masked in rendered reports.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

/// Terminal result of a run: the single surface handed back to the invoking
/// layer. A run succeeds iff no step failed without `continue_on_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub workflow: String,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    /// Resolved `on_complete` return value of a successful run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn step(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }
}

/// Run-scoped mutable state: recorded step outputs plus externally supplied
/// variables. Created fresh per run and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    step_outputs: BTreeMap<String, Value>,
    variables: BTreeMap<String, Value>,
    dry_run: bool,
}

impl ExecutionContext {
    pub fn new(variables: BTreeMap<String, Value>, dry_run: bool) -> Self {
        Self {
            step_outputs: BTreeMap::new(),
            variables,
            dry_run,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.step_outputs.get(step_id)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Records a completed step's output. Outputs are append-only for the
    /// remainder of the run.
    pub fn record_step_output(&mut self, step_id: &str, output: Value) -> Result<(), WorkflowError> {
        if self.step_outputs.contains_key(step_id) {
            return Err(WorkflowError::OutputAlreadyRecorded {
                step_id: step_id.to_string(),
            });
        }
        self.step_outputs.insert(step_id.to_string(), output);
        Ok(())
    }

    /// Binds a loop variable for a foreach iteration, returning the shadowed
    /// value so the caller can restore it afterwards.
    pub fn bind_variable(&mut self, name: &str, value: Value) -> Option<Value> {
        self.variables.insert(name.to_string(), value)
    }

    pub fn restore_variable(&mut self, name: &str, previous: Option<Value>) {
        match previous {
            Some(value) => {
                self.variables.insert(name.to_string(), value);
            }
            None => {
                self.variables.remove(name);
            }
        }
    }
}
