use crate::workflow::error::{io_error, json_error, WorkflowError};
use crate::workflow::executors::ExecutorRegistry;
use crate::workflow::validate::validate_workflow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A declarative workflow document: a named, ordered list of steps plus
/// optional default variables. Immutable once loaded for a given run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<OnComplete>,
}

/// Terminal action of a successful run. `return` resolves `value` against
/// the finished run's outputs and surfaces it as the run's final value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnComplete {
    #[serde(default = "default_on_complete_action")]
    pub action: String,
    #[serde(default)]
    pub value: Value,
}

fn default_on_complete_action() -> String {
    "return".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continue_on_error: bool,
    /// Masks this step's output in rendered run reports.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_error: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Workflow {
    /// Default value for a declared variable. A declaration may be either a
    /// bare value or an object of the form `{"type": ..., "default": ...}`.
    pub fn variable_default(&self, name: &str) -> Option<Value> {
        let declared = self.variables.get(name)?;
        match declared {
            Value::Object(map) if map.contains_key("default") => map.get("default").cloned(),
            other => Some(other.clone()),
        }
    }

    pub fn default_variables(&self) -> BTreeMap<String, Value> {
        self.variables
            .keys()
            .filter_map(|name| {
                self.variable_default(name)
                    .map(|value| (name.clone(), value))
            })
            .collect()
    }
}

/// Parses and validates a workflow document from a JSON string, against the
/// default action set.
pub fn load_workflow_str(raw: &str) -> Result<Workflow, WorkflowError> {
    let workflow: Workflow =
        serde_json::from_str(raw).map_err(|err| json_error(Path::new("<inline>"), err))?;
    validate_workflow(&workflow, &ExecutorRegistry::default())?;
    Ok(workflow)
}

/// Reads, parses and validates a workflow document from disk.
pub fn load_workflow_file(path: &Path) -> Result<Workflow, WorkflowError> {
    if !path.is_file() {
        return Err(WorkflowError::PathNotFound {
            path: path.display().to_string(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|err| io_error(path, err))?;
    let workflow: Workflow = serde_json::from_str(&raw).map_err(|err| json_error(path, err))?;
    validate_workflow(&workflow, &ExecutorRegistry::default())?;
    Ok(workflow)
}
