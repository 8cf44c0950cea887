use crate::shared::fs_atomic::atomic_write_file;
use crate::workflow::context::ExecutionContext;
use crate::workflow::document::Step;
use crate::workflow::error::WorkflowError;
use crate::workflow::executors::{
    check_string_param, require_string_param, ActionExecutor, ExecOutcome, ExecutorRegistry,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

const OPS: [&str; 3] = ["set", "merge", "delete"];

/// Reads a JSON document, applies one patch operation at a dotted key path
/// and writes the document back atomically.
///
/// `set` creates missing intermediate objects; `merge` shallow-merges an
/// object into the object at the path; `delete` removes the key and fails
/// with a path-not-found error when it is absent. The previous value at the
/// path is captured in the step output.
pub struct JsonFileExecutor;

impl ActionExecutor for JsonFileExecutor {
    fn kind(&self) -> &'static str {
        "json_file"
    }

    fn validate(&self, step: &Step) -> Vec<String> {
        let mut violations = Vec::new();
        check_string_param(step, "file", &mut violations);
        check_string_param(step, "path", &mut violations);
        match step.params.get("op").and_then(Value::as_str) {
            Some(op) if OPS.contains(&op) => {
                if op != "delete" && !step.params.contains_key("value") {
                    violations.push(format!(
                        "step `{}`: op `{op}` requires param `value`",
                        step.id
                    ));
                }
            }
            Some(op) => violations.push(format!(
                "step `{}`: unknown op `{op}` (expected set, merge or delete)",
                step.id
            )),
            None => violations.push(format!("step `{}`: missing required param `op`", step.id)),
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
        let file = require_string_param(step, params, "file")?;
        let op = require_string_param(step, params, "op")?;
        let key_path = require_string_param(step, params, "path")?;
        let value = params.get("value");

        if ctx.dry_run() {
            return Ok(ExecOutcome::preview(json!({
                "updated": false,
                "preview": {"file": file, "op": op, "path": key_path},
            })));
        }

        let file_path = Path::new(&file);
        let mut document = read_document(file_path, &op)?;

        let previous = apply_patch(step, &mut document, &op, &key_path, value, &file)?;

        let rendered =
            serde_json::to_vec_pretty(&document).map_err(|err| WorkflowError::FileAccess {
                path: file.clone(),
                reason: format!("failed to encode document: {err}"),
            })?;
        atomic_write_file(file_path, &rendered).map_err(|err| WorkflowError::FileAccess {
            path: file.clone(),
            reason: err.to_string(),
        })?;

        Ok(ExecOutcome::live(json!({
            "updated": true,
            "op": op,
            "path": key_path,
            "previous": previous,
        })))
    }
}

fn read_document(file_path: &Path, op: &str) -> Result<Value, WorkflowError> {
    if !file_path.exists() {
        // set/merge start from an empty document; delete has nothing to act on.
        if op == "delete" {
            return Err(WorkflowError::PathNotFound {
                path: file_path.display().to_string(),
            });
        }
        return Ok(Value::Object(Map::new()));
    }
    let raw = fs::read_to_string(file_path).map_err(|err| WorkflowError::FileAccess {
        path: file_path.display().to_string(),
        reason: err.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|err| WorkflowError::FileAccess {
        path: file_path.display().to_string(),
        reason: format!("invalid json: {err}"),
    })
}

fn apply_patch(
    step: &Step,
    document: &mut Value,
    op: &str,
    key_path: &str,
    value: Option<&Value>,
    file: &str,
) -> Result<Value, WorkflowError> {
    let segments: Vec<&str> = key_path.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: "param `path` must name at least one key".to_string(),
        });
    }
    let (leaf, parents) = segments.split_last().expect("segments is non-empty");

    match op {
        "set" => {
            let value = value.cloned().unwrap_or(Value::Null);
            let target = descend_creating(step, document, parents)?;
            let previous = target.get(*leaf).cloned().unwrap_or(Value::Null);
            target.insert((*leaf).to_string(), value);
            Ok(previous)
        }
        "merge" => {
            let Some(Value::Object(patch)) = value else {
                return Err(WorkflowError::StepExecution {
                    step_id: step.id.clone(),
                    reason: "op `merge` requires an object `value`".to_string(),
                });
            };
            let patch = patch.clone();
            let parent = descend_creating(step, document, parents)?;
            let slot = parent
                .entry((*leaf).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(existing) = slot else {
                return Err(WorkflowError::StepExecution {
                    step_id: step.id.clone(),
                    reason: format!("cannot merge into `{key_path}`: existing value is not an object"),
                });
            };
            let previous = Value::Object(existing.clone());
            for (key, item) in patch {
                existing.insert(key, item);
            }
            Ok(previous)
        }
        "delete" => {
            let target = descend_existing(document, parents);
            let removed = target.and_then(|map| map.remove(*leaf));
            removed.ok_or_else(|| WorkflowError::PathNotFound {
                path: format!("{file}#{key_path}"),
            })
        }
        other => Err(WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: format!("unknown op `{other}`"),
        }),
    }
}

fn descend_creating<'a>(
    step: &Step,
    document: &'a mut Value,
    parents: &[&str],
) -> Result<&'a mut Map<String, Value>, WorkflowError> {
    let mut current = document;
    for segment in parents {
        let map = current
            .as_object_mut()
            .ok_or_else(|| WorkflowError::StepExecution {
                step_id: step.id.clone(),
                reason: format!("cannot traverse `{segment}`: parent is not an object"),
            })?;
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current
        .as_object_mut()
        .ok_or_else(|| WorkflowError::StepExecution {
            step_id: step.id.clone(),
            reason: "target of patch is not an object".to_string(),
        })
}

fn descend_existing<'a>(
    document: &'a mut Value,
    parents: &[&str],
) -> Option<&'a mut Map<String, Value>> {
    let mut current = document;
    for segment in parents {
        current = current.as_object_mut()?.get_mut(*segment)?;
    }
    current.as_object_mut()
}
