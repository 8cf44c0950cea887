use flowbot::agents::{
    AgentRegistry, Capability, CapabilityDescriptor, ParameterKind, ParameterSpec, RegistryError,
};
use flowbot::chat::{run_chat_turn, ChatClient, ChatError, ChatMessage, ChatOutcome, ChatRole};
use serde_json::{json, Map, Value};
use std::cell::RefCell;

/// Scripted completion client: pops one outcome per round and records the
/// transcript it was shown.
struct ScriptedClient {
    outcomes: RefCell<Vec<ChatOutcome>>,
    seen: RefCell<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    fn new(mut outcomes: Vec<ChatOutcome>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: RefCell::new(outcomes),
            seen: RefCell::new(Vec::new()),
        }
    }
}

impl ChatClient for ScriptedClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
        _capabilities: &[CapabilityDescriptor],
    ) -> Result<ChatOutcome, ChatError> {
        self.seen.borrow_mut().push(messages.to_vec());
        self.outcomes
            .borrow_mut()
            .pop()
            .ok_or_else(|| ChatError::Protocol {
                reason: "script exhausted".to_string(),
            })
    }
}

struct CountingCapability;

impl Capability for CountingCapability {
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: "counter".to_string(),
            description: "counts the items it is given".to_string(),
            parameters: vec![
                ParameterSpec::new("items", "items to count", ParameterKind::Array).required(),
            ],
        }
    }

    fn invoke(&self, args: &Map<String, Value>) -> Result<String, RegistryError> {
        let count = args
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        Ok(format!("counted {count} item(s)"))
    }
}

fn registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(Box::new(CountingCapability));
    registry
}

fn call(name: &str, arguments: Value) -> ChatOutcome {
    let Value::Object(arguments) = arguments else {
        panic!("arguments must be an object");
    };
    ChatOutcome::CapabilityCall {
        name: name.to_string(),
        arguments,
    }
}

#[test]
fn plain_reply_ends_the_turn_immediately() {
    let client = ScriptedClient::new(vec![ChatOutcome::Reply("hello there".to_string())]);
    let turn = run_chat_turn(&client, &registry(), vec![ChatMessage::user("hi")], 5)
        .expect("turn");

    assert_eq!(turn.reply, "hello there");
    assert!(turn.capability_calls.is_empty());
    assert_eq!(turn.messages.len(), 2);
    assert_eq!(turn.messages[1].role, ChatRole::Assistant);
}

#[test]
fn capability_results_are_fed_back_before_the_final_reply() {
    let client = ScriptedClient::new(vec![
        call("counter", json!({"items": ["a", "b", "c"]})),
        ChatOutcome::Reply("there are three".to_string()),
    ]);
    let turn = run_chat_turn(
        &client,
        &registry(),
        vec![ChatMessage::user("how many?")],
        5,
    )
    .expect("turn");

    assert_eq!(turn.reply, "there are three");
    assert_eq!(turn.capability_calls, vec!["counter".to_string()]);

    // The second round saw the capability result in the transcript.
    let rounds = client.seen.borrow();
    assert_eq!(rounds.len(), 2);
    let fed_back = &rounds[1][1];
    assert_eq!(fed_back.role, ChatRole::Function);
    assert_eq!(fed_back.name.as_deref(), Some("counter"));
    assert_eq!(fed_back.content, "counted 3 item(s)");
}

#[test]
fn capability_failures_become_result_text_instead_of_aborting() {
    let client = ScriptedClient::new(vec![
        call("counter", json!({})),
        ChatOutcome::Reply("sorry, I could not count".to_string()),
    ]);
    let turn = run_chat_turn(&client, &registry(), vec![ChatMessage::user("count")], 5)
        .expect("turn");

    assert_eq!(turn.reply, "sorry, I could not count");
    let rounds = client.seen.borrow();
    let fed_back = &rounds[1][1];
    assert!(fed_back.content.starts_with("error:"));
    assert!(fed_back.content.contains("items"));
}

#[test]
fn a_model_that_never_stops_calling_hits_the_round_cap() {
    let client = ScriptedClient::new(vec![
        call("counter", json!({"items": []})),
        call("counter", json!({"items": []})),
        call("counter", json!({"items": []})),
    ]);
    let err = run_chat_turn(&client, &registry(), vec![ChatMessage::user("loop")], 3)
        .expect_err("cap");
    assert!(matches!(
        err,
        ChatError::DispatchRoundsExceeded { max_rounds: 3 }
    ));
}
