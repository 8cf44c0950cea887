use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },
    #[error("unresolved reference `${{{reference}}}`")]
    UnresolvedReference { reference: String },
    #[error("unknown action kind `{action}`")]
    UnsupportedAction { action: String },
    #[error("file access failed at {path}: {reason}")]
    FileAccess { path: String, reason: String },
    #[error("path not found: {path}")]
    PathNotFound { path: String },
    #[error("command timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },
    #[error("unsupported expression `{expression}`: {reason}")]
    UnsupportedExpression { expression: String, reason: String },
    #[error("step `{step_id}` execution failed: {reason}")]
    StepExecution { step_id: String, reason: String },
    #[error("step `{step_id}` output is already recorded and immutable for this run")]
    OutputAlreadyRecorded { step_id: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> WorkflowError {
    WorkflowError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn json_error(path: &Path, source: serde_json::Error) -> WorkflowError {
    WorkflowError::Json {
        path: path.display().to_string(),
        source,
    }
}
