use flowbot::workflow::{
    load_workflow_str, ActionExecutor, ExecOutcome, ExecutionContext, ExecutorRegistry,
    RunOptions, RunStatus, Step, StepStatus, Workflow, WorkflowEngine, WorkflowError,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

fn engine() -> WorkflowEngine {
    WorkflowEngine::new(Duration::from_secs(10))
}

fn vars(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn steps_run_in_declared_order_and_later_steps_see_earlier_outputs() {
    let workflow = load_workflow_str(
        r#"{
            "name": "pipeline",
            "variables": {"subject": "world"},
            "steps": [
                {"id": "greet", "action": "template", "params": {"text": "hello ${subject}"}},
                {"id": "shout", "action": "template", "params": {"text": "${greet.output}!"}}
            ]
        }"#,
    )
    .expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert!(result.succeeded());
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[0].step_id, "greet");
    assert_eq!(result.steps[1].step_id, "shout");
    assert_eq!(result.steps[1].output, json!({"output": "hello world!"}));
}

#[test]
fn supplied_variables_override_declared_defaults() {
    let workflow = load_workflow_str(
        r#"{
            "name": "defaults",
            "variables": {"region": {"type": "string", "default": "westeurope"}},
            "steps": [
                {"id": "where", "action": "template", "params": {"text": "${region}"}}
            ]
        }"#,
    )
    .expect("load");

    let default_run = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert_eq!(default_run.steps[0].output["output"], "westeurope");

    let overridden = engine()
        .run(&workflow, vars(&[("region", json!("eastus"))]), false)
        .expect("run");
    assert_eq!(overridden.steps[0].output["output"], "eastus");
}

#[test]
fn failure_aborts_and_unreached_steps_are_absent_from_the_result() {
    let workflow = load_workflow_str(
        r#"{
            "name": "abort",
            "steps": [
                {"id": "first", "action": "template", "params": {"text": "ok"}},
                {"id": "boom", "action": "template", "params": {"text": "${nope}"}},
                {"id": "after", "action": "template", "params": {"text": "never"}}
            ]
        }"#,
    )
    .expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[1].step_id, "boom");
    assert_eq!(result.steps[1].status, StepStatus::Failed);
    assert!(result.step("after").is_none());
    let error = result.steps[1].error.as_deref().expect("error recorded");
    assert!(error.contains("nope"));
}

#[test]
fn continue_on_error_records_the_failure_and_keeps_going() {
    let workflow = load_workflow_str(
        r#"{
            "name": "tolerant",
            "steps": [
                {"id": "flaky", "action": "template", "params": {"text": "${missing}"},
                 "continue_on_error": true},
                {"id": "after", "action": "template", "params": {"text": "still here"}}
            ]
        }"#,
    )
    .expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert!(result.succeeded());
    assert_eq!(result.step("flaky").expect("flaky").status, StepStatus::Failed);
    assert_eq!(
        result.step("after").expect("after").output["output"],
        "still here"
    );
}

#[test]
fn on_error_sub_steps_run_before_the_abort_surfaces() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let marker = tmp.path().join("cleanup.json");
    let definition = format!(
        r#"{{
            "name": "recovery",
            "steps": [
                {{"id": "boom", "action": "template", "params": {{"text": "${{missing}}"}},
                 "on_error": [
                    {{"id": "cleanup", "action": "json_file",
                     "params": {{"file": {marker:?}, "op": "set", "path": "cleaned", "value": true}}}}
                 ]}},
                {{"id": "after", "action": "template", "params": {{"text": "never"}}}}
            ]
        }}"#,
        marker = marker.display().to_string()
    );
    let workflow = load_workflow_str(&definition).expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.step("boom").expect("boom").status, StepStatus::Failed);
    assert_eq!(
        result.step("cleanup").expect("cleanup").status,
        StepStatus::Succeeded
    );
    assert!(result.step("after").is_none());

    let written: Value =
        serde_json::from_str(&fs::read_to_string(&marker).expect("marker")).expect("json");
    assert_eq!(written["cleaned"], true);
}

#[test]
fn false_condition_skips_the_step_without_executing_it() {
    let workflow = load_workflow_str(
        r#"{
            "name": "guarded",
            "variables": {"enabled": "false"},
            "steps": [
                {"id": "maybe", "action": "template", "params": {"text": "ran"},
                 "condition": "${enabled} == true"},
                {"id": "always", "action": "template", "params": {"text": "done"}}
            ]
        }"#,
    )
    .expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert!(result.succeeded());
    let maybe = result.step("maybe").expect("maybe");
    assert_eq!(maybe.status, StepStatus::Skipped);
    assert_eq!(maybe.output, Value::Null);

    let enabled = engine()
        .run(&workflow, vars(&[("enabled", json!("true"))]), false)
        .expect("run");
    assert_eq!(
        enabled.step("maybe").expect("maybe").status,
        StepStatus::Succeeded
    );
}

#[test]
fn invalid_workflows_are_rejected_before_any_step_runs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let target = tmp.path().join("never.json");
    let definition = format!(
        r#"{{
            "name": "invalid",
            "steps": [
                {{"id": "write", "action": "json_file",
                 "params": {{"file": {target:?}, "op": "set", "path": "k", "value": 1}}}},
                {{"id": "write", "action": "launch_missiles", "params": {{}}}}
            ]
        }}"#,
        target = target.display().to_string()
    );
    let workflow: flowbot::workflow::Workflow =
        serde_json::from_str(&definition).expect("parse");

    let err = engine()
        .run(&workflow, BTreeMap::new(), false)
        .expect_err("validation failure");
    match err {
        WorkflowError::Validation { violations } => {
            assert!(violations.iter().any(|v| v.contains("duplicate")));
            assert!(violations.iter().any(|v| v.contains("launch_missiles")));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!target.exists());
}

#[test]
fn dry_run_takes_the_same_path_but_leaves_no_trace() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let target = tmp.path().join("state.json");
    let definition = format!(
        r#"{{
            "name": "deploy",
            "steps": [
                {{"id": "scan", "action": "command",
                 "params": {{"cmd": "echo scanning", "outputs": {{"listing": "$"}}}}}},
                {{"id": "record", "action": "json_file",
                 "params": {{"file": {target:?}, "op": "set", "path": "scan.result",
                             "value": "${{scan.listing}}"}}}}
            ]
        }}"#,
        target = target.display().to_string()
    );
    let workflow = load_workflow_str(&definition).expect("load");

    let first = engine().run(&workflow, BTreeMap::new(), true).expect("dry run");
    assert!(first.succeeded());
    assert!(first.steps.iter().all(|step| step.preview));
    assert_eq!(first.steps[0].output["listing"], "<scan.listing>");
    assert!(!target.exists(), "dry run must not write files");

    // Same inputs, same preview: repeating the dry run changes nothing.
    let second = engine().run(&workflow, BTreeMap::new(), true).expect("dry run");
    assert_eq!(first, second);
    assert!(!target.exists());
}

#[test]
fn live_run_of_the_same_workflow_applies_the_side_effects() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let target = tmp.path().join("state.json");
    let definition = format!(
        r#"{{
            "name": "deploy",
            "steps": [
                {{"id": "scan", "action": "command",
                 "params": {{"cmd": "echo '[1, 2, 3]'", "outputs": {{"count": "$.length"}}}}}},
                {{"id": "record", "action": "json_file",
                 "params": {{"file": {target:?}, "op": "set", "path": "scan.count",
                             "value": "${{scan.count}}"}}}}
            ]
        }}"#,
        target = target.display().to_string()
    );
    let workflow = load_workflow_str(&definition).expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert!(result.succeeded());
    assert_eq!(result.steps[0].output["count"], json!(3));

    let written: Value =
        serde_json::from_str(&fs::read_to_string(&target).expect("target")).expect("json");
    assert_eq!(written["scan"]["count"], json!(3));
}

struct StampExecutor;

impl ActionExecutor for StampExecutor {
    fn kind(&self) -> &'static str {
        "stamp"
    }

    fn validate(&self, _step: &Step) -> Vec<String> {
        Vec::new()
    }

    fn execute(
        &self,
        _registry: &ExecutorRegistry,
        _step: &Step,
        params: &Map<String, Value>,
        _ctx: &mut ExecutionContext,
    ) -> Result<ExecOutcome, WorkflowError> {
        let label = params.get("label").cloned().unwrap_or(Value::Null);
        Ok(ExecOutcome::live(json!({ "stamped": label })))
    }
}

#[test]
fn custom_executors_registered_on_the_engine_pass_validation_and_run() {
    let mut registry = ExecutorRegistry::with_defaults(Duration::from_secs(10));
    registry.register(Box::new(StampExecutor));
    let engine = WorkflowEngine::with_registry(registry);

    let workflow: Workflow = serde_json::from_str(
        r#"{
            "name": "stamped",
            "steps": [
                {"id": "mark", "action": "stamp", "params": {"label": "approved"}},
                {"id": "echo", "action": "template", "params": {"text": "${mark.stamped}"}}
            ]
        }"#,
    )
    .expect("parse");

    let result = engine.run(&workflow, BTreeMap::new(), false).expect("run");
    assert!(result.succeeded());
    assert_eq!(result.step("mark").expect("mark").output["stamped"], "approved");
    assert_eq!(result.step("echo").expect("echo").output["output"], "approved");
}

#[test]
fn step_range_options_bound_which_steps_execute() {
    let workflow = load_workflow_str(
        r#"{
            "name": "ranged",
            "steps": [
                {"id": "first", "action": "template", "params": {"text": "1"}},
                {"id": "second", "action": "template", "params": {"text": "2"}},
                {"id": "third", "action": "template", "params": {"text": "3"}}
            ]
        }"#,
    )
    .expect("load");
    let engine = engine();

    let options = RunOptions {
        start_from_step: Some("second".to_string()),
        stop_at_step: Some("second".to_string()),
        ..RunOptions::default()
    };
    let result = engine
        .run_with_options(&workflow, BTreeMap::new(), options)
        .expect("run");
    assert!(result.succeeded());
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].step_id, "second");

    let tail = RunOptions {
        start_from_step: Some("second".to_string()),
        ..RunOptions::default()
    };
    let result = engine
        .run_with_options(&workflow, BTreeMap::new(), tail)
        .expect("run");
    assert_eq!(result.steps.len(), 2);
    assert!(result.step("first").is_none());

    let unknown = RunOptions {
        start_from_step: Some("missing".to_string()),
        ..RunOptions::default()
    };
    let err = engine
        .run_with_options(&workflow, BTreeMap::new(), unknown)
        .expect_err("unknown step id");
    assert!(err.to_string().contains("missing"));

    let backwards = RunOptions {
        start_from_step: Some("third".to_string()),
        stop_at_step: Some("first".to_string()),
        ..RunOptions::default()
    };
    let err = engine
        .run_with_options(&workflow, BTreeMap::new(), backwards)
        .expect_err("backwards range");
    assert!(err.to_string().contains("start_from_step"));
}

#[test]
fn on_complete_return_resolves_the_final_value_of_a_successful_run() {
    let workflow = load_workflow_str(
        r#"{
            "name": "returning",
            "steps": [
                {"id": "greet", "action": "template", "params": {"text": "hello"}}
            ],
            "on_complete": {"action": "return", "value": "${greet.output}"}
        }"#,
    )
    .expect("load");

    let result = engine().run(&workflow, BTreeMap::new(), false).expect("run");
    assert_eq!(result.output, Some(json!("hello")));

    // A failed run carries no final value.
    let failing = load_workflow_str(
        r#"{
            "name": "failing",
            "steps": [
                {"id": "boom", "action": "template", "params": {"text": "${missing}"}}
            ],
            "on_complete": {"action": "return", "value": "${boom.output}"}
        }"#,
    )
    .expect("load");
    let result = engine().run(&failing, BTreeMap::new(), false).expect("run");
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.output, None);
}

#[test]
fn colliding_recovery_output_is_reported_in_the_run_log() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let workflow = load_workflow_str(
        r#"{
            "name": "colliding",
            "steps": [
                {"id": "cleanup", "action": "template", "params": {"text": "original"}},
                {"id": "boom", "action": "template", "params": {"text": "${missing}"},
                 "on_error": [
                    {"id": "cleanup", "action": "template", "params": {"text": "recovery"}}
                 ]}
            ]
        }"#,
    )
    .expect("load");

    let engine = WorkflowEngine::new(Duration::from_secs(10))
        .with_state_root(tmp.path().to_path_buf());
    let result = engine.run(&workflow, BTreeMap::new(), false).expect("run");
    assert_eq!(result.status, RunStatus::Failed);

    let log = fs::read_to_string(tmp.path().join("logs").join("runs.log")).expect("log");
    assert!(log.contains("step_id=cleanup recovery output discarded"));
}

#[test]
fn run_log_is_appended_when_a_state_root_is_configured() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let workflow = load_workflow_str(
        r#"{
            "name": "logged",
            "steps": [
                {"id": "only", "action": "template", "params": {"text": "hi"}}
            ]
        }"#,
    )
    .expect("load");

    let engine = WorkflowEngine::new(Duration::from_secs(10))
        .with_state_root(tmp.path().to_path_buf());
    engine.run(&workflow, BTreeMap::new(), false).expect("run");

    let log = fs::read_to_string(tmp.path().join("logs").join("runs.log")).expect("log");
    assert!(log.contains("workflow `logged` started"));
    assert!(log.contains("step_id=only state=succeeded"));
    assert!(log.contains("workflow `logged` finished"));
}
