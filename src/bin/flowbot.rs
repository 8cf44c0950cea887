use flowbot::agents::{AgentRegistry, WorkflowRunnerCapability};
use flowbot::chat::{run_chat_turn, ChatMessage, ChatRole, HttpChatClient};
use flowbot::config::{load_settings, Settings};
use flowbot::memory::{append_turns, load_conversation, ConversationTurn};
use flowbot::storage::{select_backend, MemoryScope, UserGuid};
use flowbot::workflow::WorkflowEngine;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are flowbot, an assistant that can list, inspect, validate and \
run workflow definitions on behalf of the user. Prefer a dry run before executing a workflow \
with side effects.";

fn output_header() -> &'static str {
    "flowbot\nflowbot is a chat-driven workflow runner with file-backed conversation memory."
}

fn print_header() {
    println!("{}\n", output_header());
}

fn help_text() -> String {
    [
        "Usage: flowbot <command> [options]",
        "",
        "Commands:",
        "  list                      List stored workflow definitions",
        "  describe <name>           Show a workflow's variables and steps",
        "  validate <name>           Check a workflow definition",
        "  dry-run <name>            Preview a run without side effects",
        "  run <name>                Execute a workflow",
        "  chat <message>            Send one chat message through the orchestrator",
        "",
        "Options:",
        "  --var KEY=VALUE           Override a workflow variable (repeatable)",
        "  --workflows DIR           Directory of workflow definitions",
        "  --user GUID               Chat against a per-user memory scope",
    ]
    .join("\n")
}

struct CliOptions {
    positional: Vec<String>,
    variables: Map<String, Value>,
    workflows_dir: Option<PathBuf>,
    user: Option<String>,
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        positional: Vec::new(),
        variables: Map::new(),
        workflows_dir: None,
        user: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--var" => {
                let pair = iter.next().ok_or("--var requires KEY=VALUE")?;
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("invalid --var `{pair}`, expected KEY=VALUE"))?;
                options
                    .variables
                    .insert(key.to_string(), Value::String(value.to_string()));
            }
            "--workflows" => {
                let dir = iter.next().ok_or("--workflows requires a directory")?;
                options.workflows_dir = Some(PathBuf::from(dir));
            }
            "--user" => {
                let guid = iter.next().ok_or("--user requires a GUID")?;
                options.user = Some(guid.clone());
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option `{other}`"));
            }
            other => options.positional.push(other.to_string()),
        }
    }
    Ok(options)
}

fn build_registry(settings: &Settings, workflows_dir: Option<PathBuf>) -> AgentRegistry {
    let engine = WorkflowEngine::new(Duration::from_secs(settings.command_timeout_seconds));
    let dir = workflows_dir.unwrap_or_else(|| settings.workflows_dir.clone());
    let mut registry = AgentRegistry::new();
    registry.register(Box::new(WorkflowRunnerCapability::new(dir, engine)));
    registry
}

fn cmd_workflow(action: &str, options: CliOptions) -> Result<String, String> {
    let settings = load_settings().map_err(|e| e.to_string())?;
    let registry = build_registry(&settings, options.workflows_dir);

    let mut args = Map::new();
    args.insert("action".to_string(), Value::String(action.to_string()));
    if action != "list" {
        let name = options
            .positional
            .first()
            .ok_or_else(|| format!("`{action}` requires a workflow name"))?;
        args.insert("workflow_name".to_string(), Value::String(name.clone()));
    }
    if !options.variables.is_empty() {
        args.insert(
            "variables".to_string(),
            Value::Object(options.variables.clone()),
        );
    }
    registry
        .invoke("workflow_runner", &args)
        .map_err(|e| e.to_string())
}

fn cmd_chat(options: CliOptions) -> Result<String, String> {
    let message = options.positional.join(" ");
    if message.trim().is_empty() {
        return Err("chat requires a message".to_string());
    }

    let settings = load_settings().map_err(|e| e.to_string())?;
    let api_key = std::env::var(&settings.api_key_env)
        .map_err(|_| format!("environment variable {} is not set", settings.api_key_env))?;

    let scope = match &options.user {
        Some(guid) => MemoryScope::User(UserGuid::parse(guid).map_err(|e| e.to_string())?),
        None => MemoryScope::Shared,
    };
    let storage_root = match &settings.storage_root {
        Some(root) => root.clone(),
        None => {
            let home = std::env::var_os("HOME").ok_or("HOME is not set")?;
            PathBuf::from(home).join(".flowbot").join("state")
        }
    };
    let store = select_backend(storage_root).map_err(|e| e.to_string())?;

    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    let history = load_conversation(store.as_ref(), &scope).map_err(|e| e.to_string())?;
    messages.extend(history.iter().map(ConversationTurn::as_message));
    messages.push(ChatMessage::user(&message));

    let client = HttpChatClient::new(&settings.chat_endpoint, &api_key, &settings.chat_model);
    let registry = build_registry(&settings, options.workflows_dir);
    let turn = run_chat_turn(
        &client,
        &registry,
        messages,
        settings.max_dispatch_rounds,
    )
    .map_err(|e| e.to_string())?;

    let now = chrono::Utc::now();
    let new_turns = [
        ConversationTurn::new(ChatRole::User, &message, now),
        ConversationTurn::new(ChatRole::Assistant, &turn.reply, now),
    ];
    append_turns(store.as_ref(), &scope, &new_turns, settings.history_window)
        .map_err(|e| e.to_string())?;

    Ok(turn.reply)
}

fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }
    let verb = args[0].clone();
    let options = parse_options(&args[1..])?;
    match verb.as_str() {
        "list" => cmd_workflow("list", options),
        "describe" => cmd_workflow("describe", options),
        "validate" => cmd_workflow("validate", options),
        "dry-run" => cmd_workflow("dry_run", options),
        "run" => cmd_workflow("run", options),
        "chat" => cmd_chat(options),
        "help" | "--help" | "-h" => Ok(help_text()),
        other => Err(format!("unknown command `{other}`")),
    }
}

fn run() -> Result<(), String> {
    print_header();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output = run_cli(args)?;
    println!("{output}");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
