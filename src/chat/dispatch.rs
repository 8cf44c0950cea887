use crate::agents::AgentRegistry;
use crate::chat::types::{ChatClient, ChatError, ChatMessage, ChatOutcome};

/// Result of one user turn after any capability rounds have settled.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// Final assistant reply text.
    pub reply: String,
    /// The transcript including the reply and any capability exchanges.
    pub messages: Vec<ChatMessage>,
    /// Capability names invoked during the turn, in order.
    pub capability_calls: Vec<String>,
}

/// Drives one user turn to completion: asks the completion endpoint, invokes
/// any capability it requests, feeds the result back in, and repeats until a
/// plain reply arrives. Capability failures are reported back to the model as
/// result text so it can recover or explain; the round cap keeps a model that
/// never stops calling from looping forever.
pub fn run_chat_turn(
    client: &dyn ChatClient,
    registry: &AgentRegistry,
    messages: Vec<ChatMessage>,
    max_rounds: usize,
) -> Result<ChatTurn, ChatError> {
    let capabilities = registry.descriptors();
    let mut transcript = messages;
    let mut capability_calls = Vec::new();

    for _ in 0..max_rounds {
        match client.complete(&transcript, &capabilities)? {
            ChatOutcome::Reply(reply) => {
                transcript.push(ChatMessage::assistant(&reply));
                return Ok(ChatTurn {
                    reply,
                    messages: transcript,
                    capability_calls,
                });
            }
            ChatOutcome::CapabilityCall { name, arguments } => {
                capability_calls.push(name.clone());
                let result = match registry.invoke(&name, &arguments) {
                    Ok(result) => result,
                    Err(err) => format!("error: {err}"),
                };
                transcript.push(ChatMessage::capability_result(&name, &result));
            }
        }
    }
    Err(ChatError::DispatchRoundsExceeded { max_rounds })
}
