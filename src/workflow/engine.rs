use crate::shared::ids::generate_run_id;
use crate::shared::logging::append_run_log_line;
use crate::workflow::context::{ExecutionContext, RunResult, RunStatus, StepResult, StepStatus};
use crate::workflow::document::{Step, Workflow};
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{evaluate_expression, ExecOutcome, ExecutorRegistry};
use crate::workflow::resolve::{resolve_param_value, resolve_text};
use crate::workflow::validate::validate_workflow;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Per-step interpreter states. Steps move strictly
/// `pending -> resolving -> executing` before reaching a terminal state;
/// a false condition guard short-circuits to `skipped` and a resolution
/// failure reaches `failed` without ever executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Resolving,
    Executing,
    Succeeded,
    Failed,
    Skipped,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Skipped
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Resolving => "resolving",
            StepState::Executing => "executing",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run execution controls beyond the workflow document itself.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Skip every step before this id; execution starts here.
    pub start_from_step: Option<String>,
    /// Execute up to and including this id, then stop.
    pub stop_at_step: Option<String>,
}

impl RunOptions {
    pub fn dry_run(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }
}

/// Sequential step orchestrator. Each run gets a fresh ExecutionContext;
/// steps execute in declared order, later steps may reference earlier
/// outputs, and a failure without `continue_on_error` aborts the remainder
/// after the step's `on_error` sub-steps have run.
pub struct WorkflowEngine {
    registry: ExecutorRegistry,
    state_root: Option<PathBuf>,
}

impl WorkflowEngine {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            registry: ExecutorRegistry::with_defaults(command_timeout),
            state_root: None,
        }
    }

    pub fn with_registry(registry: ExecutorRegistry) -> Self {
        Self {
            registry,
            state_root: None,
        }
    }

    /// Enables the append-only run log under `state_root/logs/`.
    pub fn with_state_root(mut self, state_root: PathBuf) -> Self {
        self.state_root = Some(state_root);
        self
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Validates and runs a workflow. Validation failures abort before any
    /// step executes; step failures are captured in the run result rather
    /// than returned as errors.
    pub fn run(
        &self,
        workflow: &Workflow,
        variables: BTreeMap<String, Value>,
        dry_run: bool,
    ) -> Result<RunResult, WorkflowError> {
        self.run_with_options(workflow, variables, RunOptions::dry_run(dry_run))
    }

    pub fn run_with_options(
        &self,
        workflow: &Workflow,
        variables: BTreeMap<String, Value>,
        options: RunOptions,
    ) -> Result<RunResult, WorkflowError> {
        validate_workflow(workflow, &self.registry)?;
        let range = step_range(workflow, &options)?;
        let dry_run = options.dry_run;

        let run_id = generate_run_id(chrono::Utc::now().timestamp())
            .unwrap_or_else(|_| "run-unknown".to_string());
        let mut merged = workflow.default_variables();
        merged.extend(variables);
        let mut ctx = ExecutionContext::new(merged, dry_run);

        self.log(&run_id, &format!("workflow `{}` started dry_run={dry_run}", workflow.name));

        let mut results = Vec::new();
        let mut aborted = false;
        for step in &workflow.steps[range] {
            self.log_state(&run_id, &step.id, StepState::Pending);

            if let Some(condition) = &step.condition {
                match self.evaluate_guard(condition, &ctx) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.log_state(&run_id, &step.id, StepState::Skipped);
                        results.push(StepResult {
                            step_id: step.id.clone(),
                            status: StepStatus::Skipped,
                            output: Value::Null,
                            error: None,
                            preview: false,
                            sensitive: step.sensitive,
                        });
                        continue;
                    }
                    Err(err) => {
                        aborted = self.record_failure(&run_id, step, err, &mut results, &mut ctx);
                        if aborted {
                            break;
                        }
                        continue;
                    }
                }
            }

            match self.resolve_and_execute(&run_id, step, &mut ctx) {
                Ok(outcome) => {
                    ctx.record_step_output(&step.id, outcome.output.clone())?;
                    self.log_state(&run_id, &step.id, StepState::Succeeded);
                    results.push(StepResult {
                        step_id: step.id.clone(),
                        status: StepStatus::Succeeded,
                        output: outcome.output,
                        error: None,
                        preview: outcome.preview,
                        sensitive: step.sensitive,
                    });
                }
                Err(err) => {
                    aborted = self.record_failure(&run_id, step, err, &mut results, &mut ctx);
                    if aborted {
                        break;
                    }
                }
            }
        }

        let status = if aborted {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        let output = match &workflow.on_complete {
            Some(on_complete) if status == RunStatus::Succeeded => {
                Some(resolve_param_value(&on_complete.value, &ctx)?)
            }
            _ => None,
        };
        self.log(
            &run_id,
            &format!("workflow `{}` finished status={status:?}", workflow.name),
        );
        Ok(RunResult {
            workflow: workflow.name.clone(),
            status,
            steps: results,
            output,
        })
    }

    fn resolve_and_execute(
        &self,
        run_id: &str,
        step: &Step,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        self.log_state(run_id, &step.id, StepState::Resolving);
        let executor =
            self.registry
                .executor(&step.action)
                .ok_or_else(|| WorkflowError::UnsupportedAction {
                    action: step.action.clone(),
                })?;
        let params = executor.resolve_params(step, ctx)?;
        self.log_state(run_id, &step.id, StepState::Executing);
        executor.execute(&self.registry, step, &params, ctx)
    }

    /// Records a failed step and applies its error policy. Returns true when
    /// the run must abort.
    fn record_failure(
        &self,
        run_id: &str,
        step: &Step,
        err: WorkflowError,
        results: &mut Vec<StepResult>,
        ctx: &mut ExecutionContext,
    ) -> bool {
        self.log(run_id, &format!("step_id={} state=failed error={err}", step.id));
        results.push(StepResult {
            step_id: step.id.clone(),
            status: StepStatus::Failed,
            output: Value::Null,
            error: Some(err.to_string()),
            preview: false,
            sensitive: step.sensitive,
        });

        if step.continue_on_error {
            return false;
        }

        // Recovery sub-steps run before the abort surfaces; their own
        // failures are recorded but never mask the original error.
        for sub_step in &step.on_error {
            match self.resolve_and_execute(run_id, sub_step, ctx) {
                Ok(outcome) => {
                    if let Err(collision) =
                        ctx.record_step_output(&sub_step.id, outcome.output.clone())
                    {
                        // Outputs stay append-only; the discarded recovery
                        // output is still visible in the run log.
                        self.log(
                            run_id,
                            &format!(
                                "step_id={} recovery output discarded: {collision}",
                                sub_step.id
                            ),
                        );
                    }
                    self.log_state(run_id, &sub_step.id, StepState::Succeeded);
                    results.push(StepResult {
                        step_id: sub_step.id.clone(),
                        status: StepStatus::Succeeded,
                        output: outcome.output,
                        error: None,
                        preview: outcome.preview,
                        sensitive: sub_step.sensitive,
                    });
                }
                Err(sub_err) => {
                    self.log_state(run_id, &sub_step.id, StepState::Failed);
                    results.push(StepResult {
                        step_id: sub_step.id.clone(),
                        status: StepStatus::Failed,
                        output: Value::Null,
                        error: Some(sub_err.to_string()),
                        preview: false,
                        sensitive: sub_step.sensitive,
                    });
                }
            }
        }
        true
    }

    fn evaluate_guard(
        &self,
        condition: &str,
        ctx: &ExecutionContext,
    ) -> Result<bool, WorkflowError> {
        let resolved = resolve_text(condition, ctx)?;
        evaluate_expression(&resolved)
    }

    fn log_state(&self, run_id: &str, step_id: &str, state: StepState) {
        self.log(run_id, &format!("step_id={step_id} state={state}"));
    }

    fn log(&self, run_id: &str, message: &str) {
        if let Some(state_root) = &self.state_root {
            let _ = append_run_log_line(state_root, &format!("run_id={run_id} {message}"));
        }
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Resolves `start_from_step`/`stop_at_step` to an index range over the
/// declared steps. Ids that match no step, or a range that runs backwards,
/// are rejected before anything executes.
fn step_range(
    workflow: &Workflow,
    options: &RunOptions,
) -> Result<std::ops::RangeInclusive<usize>, WorkflowError> {
    let position = |step_id: &str| {
        workflow
            .steps
            .iter()
            .position(|step| step.id == step_id)
            .ok_or_else(|| WorkflowError::Validation {
                violations: vec![format!("no step with id `{step_id}` in this workflow")],
            })
    };
    let start = match &options.start_from_step {
        Some(step_id) => position(step_id)?,
        None => 0,
    };
    let stop = match &options.stop_at_step {
        Some(step_id) => position(step_id)?,
        None => workflow.steps.len().saturating_sub(1),
    };
    if start > stop {
        return Err(WorkflowError::Validation {
            violations: vec![
                "start_from_step comes after stop_at_step in the declared order".to_string(),
            ],
        });
    }
    Ok(start..=stop)
}
