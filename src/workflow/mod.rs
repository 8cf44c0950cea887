pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod executors;
pub mod resolve;
pub mod validate;

pub use context::{ExecutionContext, RunResult, RunStatus, StepResult, StepStatus};
pub use document::{load_workflow_file, load_workflow_str, OnComplete, Step, Workflow};
pub use engine::{RunOptions, StepState, WorkflowEngine};
pub use error::WorkflowError;
pub use executors::{ActionExecutor, ExecOutcome, ExecutorRegistry};
pub use resolve::{resolve_param_value, resolve_text, resolve_value};
pub use validate::validate_workflow;
