use crate::agents::registry::{
    Capability, CapabilityDescriptor, ParameterKind, ParameterSpec, RegistryError,
};
use crate::workflow::{
    load_workflow_str, RunOptions, RunResult, StepStatus, Workflow, WorkflowEngine, WorkflowError,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CAPABILITY_NAME: &str = "workflow_runner";

/// Capability that lets a conversation list, inspect, validate and run the
/// workflow definitions stored on disk. Definitions are JSON files under the
/// configured directory, addressed by file stem; ad-hoc definitions can be
/// passed inline instead.
pub struct WorkflowRunnerCapability {
    workflows_dir: PathBuf,
    engine: WorkflowEngine,
}

impl WorkflowRunnerCapability {
    pub fn new(workflows_dir: PathBuf, engine: WorkflowEngine) -> Self {
        Self {
            workflows_dir,
            engine,
        }
    }

    fn load_target(
        &self,
        args: &Map<String, Value>,
    ) -> Result<(String, Workflow), RegistryError> {
        if let Some(inline) = args.get("workflow_json").and_then(Value::as_str) {
            let workflow = load_workflow_str(inline).map_err(invocation)?;
            return Ok((workflow.name.clone(), workflow));
        }
        let name = args
            .get("workflow_name")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistryError::MissingArg {
                capability: CAPABILITY_NAME.to_string(),
                arg: "workflow_name".to_string(),
            })?;
        let path = self.workflows_dir.join(format!("{name}.json"));
        let raw = read_definition(&path).map_err(invocation)?;
        let workflow = load_workflow_str(&raw).map_err(invocation)?;
        Ok((name.to_string(), workflow))
    }

    fn list(&self) -> Result<String, RegistryError> {
        let mut names = Vec::new();
        if self.workflows_dir.is_dir() {
            let entries = fs::read_dir(&self.workflows_dir).map_err(|err| {
                invocation(WorkflowError::FileAccess {
                    path: self.workflows_dir.display().to_string(),
                    reason: err.to_string(),
                })
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                    if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        if names.is_empty() {
            return Ok("no workflows available".to_string());
        }
        let mut lines = vec![format!("{} workflow(s):", names.len())];
        for name in names {
            lines.push(format!("- {name}"));
        }
        Ok(lines.join("\n"))
    }

    fn describe(&self, args: &Map<String, Value>) -> Result<String, RegistryError> {
        let (name, workflow) = self.load_target(args)?;
        let mut lines = vec![match &workflow.description {
            Some(description) => format!("workflow `{name}`: {description}"),
            None => format!("workflow `{name}`"),
        }];
        if !workflow.variables.is_empty() {
            lines.push("variables:".to_string());
            for (key, default) in &workflow.variables {
                lines.push(format!("- {key} (default: {default})"));
            }
        }
        lines.push(format!("steps ({}):", workflow.steps.len()));
        for step in &workflow.steps {
            let mut line = format!("- {} [{}]", step.id, step.action);
            if step.condition.is_some() {
                line.push_str(" (conditional)");
            }
            if step.continue_on_error {
                line.push_str(" (continues on error)");
            }
            lines.push(line);
        }
        Ok(lines.join("\n"))
    }

    fn validate(&self, args: &Map<String, Value>) -> Result<String, RegistryError> {
        match self.load_target(args) {
            Ok((name, _)) => Ok(format!("workflow `{name}` is valid")),
            Err(RegistryError::Invocation { reason, .. }) => {
                Ok(format!("workflow is invalid: {reason}"))
            }
            Err(err) => Err(err),
        }
    }

    fn run(&self, args: &Map<String, Value>, dry_run: bool) -> Result<String, RegistryError> {
        let (name, workflow) = self.load_target(args)?;
        let variables = parse_variables(args)?;
        let options = RunOptions {
            dry_run,
            start_from_step: optional_string(args, "start_from_step"),
            stop_at_step: optional_string(args, "stop_at_step"),
        };
        let result = self
            .engine
            .run_with_options(&workflow, variables, options)
            .map_err(invocation)?;
        Ok(render_run_report(&name, &result, dry_run))
    }
}

impl Capability for WorkflowRunnerCapability {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: CAPABILITY_NAME.to_string(),
            description: "List, inspect, validate and execute workflow definitions. \
                          Use dry_run first to preview what a workflow would do."
                .to_string(),
            parameters: vec![
                ParameterSpec::new(
                    "action",
                    "What to do with the workflow",
                    ParameterKind::String,
                )
                .required()
                .allowed(&["run", "list", "validate", "dry_run", "describe"]),
                ParameterSpec::new(
                    "workflow_name",
                    "Name of a stored workflow definition",
                    ParameterKind::String,
                ),
                ParameterSpec::new(
                    "workflow_json",
                    "Inline workflow definition as a JSON string",
                    ParameterKind::String,
                ),
                ParameterSpec::new(
                    "variables",
                    "Values overriding the workflow's variable defaults",
                    ParameterKind::Object,
                ),
                ParameterSpec::new(
                    "start_from_step",
                    "Skip every step before this id",
                    ParameterKind::String,
                ),
                ParameterSpec::new(
                    "stop_at_step",
                    "Stop after executing this step id",
                    ParameterKind::String,
                ),
            ],
        }
    }

    fn invoke(&self, args: &Map<String, Value>) -> Result<String, RegistryError> {
        let action = args
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match action {
            "list" => self.list(),
            "describe" => self.describe(args),
            "validate" => self.validate(args),
            "dry_run" => self.run(args, true),
            "run" => self.run(args, false),
            other => Err(RegistryError::InvalidArgValue {
                capability: CAPABILITY_NAME.to_string(),
                arg: "action".to_string(),
                allowed: format!("run, list, validate, dry_run, describe (got `{other}`)"),
            }),
        }
    }
}

fn read_definition(path: &Path) -> Result<String, WorkflowError> {
    if !path.is_file() {
        return Err(WorkflowError::PathNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|err| WorkflowError::FileAccess {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

fn parse_variables(args: &Map<String, Value>) -> Result<BTreeMap<String, Value>, RegistryError> {
    match args.get("variables") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        Some(_) => Err(RegistryError::InvalidArgType {
            capability: CAPABILITY_NAME.to_string(),
            arg: "variables".to_string(),
            expected: "object".to_string(),
        }),
    }
}

fn invocation(err: WorkflowError) -> RegistryError {
    RegistryError::Invocation {
        capability: CAPABILITY_NAME.to_string(),
        reason: err.to_string(),
    }
}

fn render_run_report(name: &str, result: &RunResult, dry_run: bool) -> String {
    let mode = if dry_run { "dry run of" } else { "run of" };
    let verdict = if result.succeeded() {
        "succeeded"
    } else {
        "failed"
    };
    let mut lines = vec![format!("{mode} workflow `{name}` {verdict}")];
    for step in &result.steps {
        let status = match step.status {
            StepStatus::Succeeded => "ok",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        let mut line = format!("- {}: {status}", step.step_id);
        if let Some(error) = &step.error {
            line.push_str(&format!(" ({error})"));
        } else if step.status == StepStatus::Succeeded {
            if step.sensitive {
                line.push_str(" (output masked)");
            } else {
                let rendered = compact_output(&step.output);
                if !rendered.is_empty() {
                    line.push_str(&format!(" {rendered}"));
                }
            }
        }
        lines.push(line);
    }
    if let Some(value) = &result.output {
        let rendered = match value {
            Value::Null => "null".to_string(),
            other => compact_output(other),
        };
        lines.push(format!("returned: {rendered}"));
    }
    lines.join("\n")
}

fn optional_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(|value| value.to_string())
}

// Step outputs can be large; keep the per-step line readable.
fn compact_output(output: &Value) -> String {
    let rendered = match output {
        Value::Null => return String::new(),
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    const LIMIT: usize = 200;
    if rendered.chars().count() > LIMIT {
        let truncated: String = rendered.chars().take(LIMIT).collect();
        format!("{truncated}...")
    } else {
        rendered
    }
}
