use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{
    check_string_param, get_nested, require_string_param, ActionExecutor, ExecOutcome,
    ExecutorRegistry,
};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs an external command line through the shell, capturing stdout, stderr
/// and the exit code. Non-zero exit is a failure; the run-level
/// `continue_on_error` policy decides whether it halts the workflow.
///
/// Optional `outputs` param maps output names to paths into the command's
/// JSON stdout: `$` (whole document), `$.length` (sequence length) or a
/// dotted `$.a.b` path.
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ActionExecutor for CommandExecutor {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn validate(&self, step: &Step) -> Vec<String> {
        let mut violations = Vec::new();
        check_string_param(step, "cmd", &mut violations);
        if let Some(outputs) = step.params.get("outputs") {
            match outputs {
                Value::Object(map) => {
                    for (name, path) in map {
                        if !path.is_string() {
                            violations.push(format!(
                                "step `{}`: output `{name}` must map to a string path",
                                step.id
                            ));
                        }
                    }
                }
                _ => violations.push(format!(
                    "step `{}`: param `outputs` must be an object of name -> path",
                    step.id
                )),
            }
        }
        violations
    }

    fn execute(
        &self,
        _registry: &ExecutorRegistry,
        step: &Step,
        params: &Map<String, Value>,
        ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let cmd = require_string_param(step, params, "cmd")?;
        let output_defs = declared_outputs(params);

        if ctx.dry_run() {
            let mut output = Map::new();
            output.insert("preview".to_string(), Value::String(cmd));
            output.insert(
                "stdout".to_string(),
                Value::String(format!("<{}.stdout>", step.id)),
            );
            output.insert(
                "stderr".to_string(),
                Value::String(format!("<{}.stderr>", step.id)),
            );
            output.insert("exit_code".to_string(), json!(0));
            for (name, _) in output_defs {
                output.insert(name.clone(), Value::String(format!("<{}.{name}>", step.id)));
            }
            return Ok(ExecOutcome::preview(Value::Object(output)));
        }

        let captured = run_with_timeout(step, &cmd, self.timeout)?;
        if captured.exit_code != 0 {
            return Err(WorkflowError::StepExecution {
                step_id: step.id.clone(),
                reason: format!(
                    "command exited with code {}: {}",
                    captured.exit_code,
                    captured.stderr.trim()
                ),
            });
        }

        let mut output = Map::new();
        output.insert("stdout".to_string(), Value::String(captured.stdout.clone()));
        output.insert("stderr".to_string(), Value::String(captured.stderr));
        output.insert("exit_code".to_string(), json!(captured.exit_code));

        if !output_defs.is_empty() {
            let trimmed = captured.stdout.trim();
            let data: Value = serde_json::from_str(trimmed)
                .unwrap_or_else(|_| Value::String(trimmed.to_string()));
            for (name, path) in output_defs {
                output.insert(name.clone(), extract_output(&data, path));
            }
        }

        Ok(ExecOutcome::live(Value::Object(output)))
    }
}

struct CapturedCommand {
    stdout: String,
    stderr: String,
    exit_code: i32,
}

fn run_with_timeout(
    step: &Step,
    cmd: &str,
    timeout: Duration,
) -> Result<CapturedCommand, WorkflowError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: format!("failed to spawn command: {err}"),
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || read_to_string_opt(stdout));
    let stderr_reader = thread::spawn(move || read_to_string_opt(stderr));

    let started = Instant::now();
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Err(WorkflowError::Timeout {
                        timeout_seconds: timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                return Err(WorkflowError::StepExecution {
                    step_id: step.id.clone(),
                    reason: format!("failed to wait for command: {err}"),
                })
            }
        }
    };

    Ok(CapturedCommand {
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
        exit_code: exit_status.code().unwrap_or(-1),
    })
}

fn read_to_string_opt<R: Read>(source: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut reader) = source {
        let _ = reader.read_to_string(&mut buf);
    }
    buf
}

fn declared_outputs(params: &Map<String, Value>) -> Vec<(&String, &str)> {
    params
        .get("outputs")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(name, path)| path.as_str().map(|p| (name, p)))
                .collect()
        })
        .unwrap_or_default()
}

fn extract_output(data: &Value, path: &str) -> Value {
    match path {
        "$" => data.clone(),
        "$.length" => match data {
            Value::Array(items) => json!(items.len()),
            _ => json!(0),
        },
        dotted => get_nested(data, dotted).cloned().unwrap_or(Value::Null),
    }
}
