use crate::agents::{CapabilityDescriptor, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Function,
}

/// One message in a conversation transcript, in the wire shape the completion
/// endpoint expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: ChatRole::System,
            content: content.to_string(),
            name: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
            name: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.to_string(),
            name: None,
        }
    }

    /// Result of a capability invocation, attributed back to the capability
    /// so the model can fold it into its next turn.
    pub fn capability_result(capability: &str, content: &str) -> Self {
        Self {
            role: ChatRole::Function,
            content: content.to_string(),
            name: Some(capability.to_string()),
        }
    }
}

/// What the model asked for: either final text or one capability invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Reply(String),
    CapabilityCall {
        name: String,
        arguments: Map<String, Value>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed: {reason}")]
    Http { reason: String },
    #[error("unexpected completion payload: {reason}")]
    Protocol { reason: String },
    #[error("conversation did not settle within {max_rounds} capability rounds")]
    DispatchRoundsExceeded { max_rounds: usize },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Completion provider seam. Production talks HTTP; tests script outcomes.
pub trait ChatClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
        capabilities: &[CapabilityDescriptor],
    ) -> Result<ChatOutcome, ChatError>;
}
