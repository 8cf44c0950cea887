use crate::agents::{CapabilityDescriptor, ParameterSpec};
use crate::chat::types::{ChatClient, ChatError, ChatMessage, ChatOutcome};
use serde_json::{json, Map, Value};

/// Chat completion client over an OpenAI-compatible endpoint. Capabilities
/// are advertised as callable functions; the model either answers directly or
/// requests one invocation per round.
pub struct HttpChatClient {
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpChatClient {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        capabilities: &[CapabilityDescriptor],
    ) -> Result<Value, ChatError> {
        let messages = serde_json::to_value(messages).map_err(|e| ChatError::Protocol {
            reason: e.to_string(),
        })?;
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !capabilities.is_empty() {
            let functions: Vec<Value> = capabilities.iter().map(capability_schema).collect();
            body["functions"] = Value::Array(functions);
            body["function_call"] = Value::String("auto".to_string());
        }
        Ok(body)
    }
}

impl ChatClient for HttpChatClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
        capabilities: &[CapabilityDescriptor],
    ) -> Result<ChatOutcome, ChatError> {
        let body = self.request_body(messages, capabilities)?;
        let response = ureq::post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| ChatError::Http {
                reason: e.to_string(),
            })?;
        let payload = response
            .into_json::<Value>()
            .map_err(|e| ChatError::Http {
                reason: e.to_string(),
            })?;
        parse_outcome(&payload)
    }
}

/// Renders a capability descriptor as the JSON schema shape the completion
/// endpoint expects for function calling.
pub fn capability_schema(descriptor: &CapabilityDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in &descriptor.parameters {
        properties.insert(spec.name.clone(), parameter_schema(spec));
        if spec.required {
            required.push(Value::String(spec.name.clone()));
        }
    }
    json!({
        "name": descriptor.name,
        "description": descriptor.description,
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required,
        },
    })
}

fn parameter_schema(spec: &ParameterSpec) -> Value {
    let mut schema = json!({
        "type": spec.kind.as_str(),
        "description": spec.description,
    });
    if !spec.allowed.is_empty() {
        schema["enum"] = Value::Array(
            spec.allowed
                .iter()
                .map(|value| Value::String(value.clone()))
                .collect(),
        );
    }
    schema
}

fn parse_outcome(payload: &Value) -> Result<ChatOutcome, ChatError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| ChatError::Protocol {
            reason: "response has no choices[0].message".to_string(),
        })?;

    if let Some(call) = message.get("function_call") {
        let name = call
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ChatError::Protocol {
                reason: "function_call has no name".to_string(),
            })?;
        // Arguments arrive as a JSON-encoded string, not an object.
        let raw_args = call
            .get("arguments")
            .and_then(Value::as_str)
            .unwrap_or("{}");
        let arguments: Map<String, Value> =
            serde_json::from_str(raw_args).map_err(|e| ChatError::Protocol {
                reason: format!("function_call arguments are not a JSON object: {e}"),
            })?;
        return Ok(ChatOutcome::CapabilityCall {
            name: name.to_string(),
            arguments,
        });
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| ChatError::Protocol {
            reason: "message has neither content nor function_call".to_string(),
        })?;
    Ok(ChatOutcome::Reply(content.to_string()))
}
