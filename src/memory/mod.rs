use crate::chat::{ChatMessage, ChatRole};
use crate::storage::{FileStore, MemoryScope, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const CONVERSATION_KEY: &str = "conversation";

/// One persisted conversation entry. Capability exchanges are not persisted;
/// the transcript keeps only what a user would recognise as the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: String,
}

impl ConversationTurn {
    pub fn new(role: ChatRole, content: &str, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: timestamp.to_rfc3339(),
        }
    }

    pub fn as_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
            name: None,
        }
    }
}

/// Loads the stored conversation for a scope. A missing or never-written
/// memory document yields an empty history.
pub fn load_conversation(
    store: &dyn FileStore,
    scope: &MemoryScope,
) -> Result<Vec<ConversationTurn>, StorageError> {
    let document = store.read_json(scope)?;
    let turns = match document.get(CONVERSATION_KEY) {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };
    Ok(turns)
}

/// Appends turns to the stored conversation, keeping at most
/// `history_window` most recent entries. Other keys in the memory document
/// are preserved.
pub fn append_turns(
    store: &dyn FileStore,
    scope: &MemoryScope,
    turns: &[ConversationTurn],
    history_window: usize,
) -> Result<(), StorageError> {
    let mut document = store.read_json(scope)?;
    if !document.is_object() {
        document = json!({});
    }

    let mut history = load_conversation(store, scope)?;
    history.extend(turns.iter().cloned());
    if history.len() > history_window {
        history.drain(..history.len() - history_window);
    }

    let rendered = history
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()
        .map_err(|err| StorageError::Json {
            path: CONVERSATION_KEY.to_string(),
            source: err,
        })?;
    document[CONVERSATION_KEY] = Value::Array(rendered);
    store.write_json(scope, &document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalFileStore;

    fn turn(content: &str) -> ConversationTurn {
        ConversationTurn::new(ChatRole::User, content, chrono::Utc::now())
    }

    #[test]
    fn missing_memory_yields_empty_history() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(tmp.path().to_path_buf()).expect("store");
        let history = load_conversation(&store, &MemoryScope::Shared).expect("load");
        assert!(history.is_empty());
    }

    #[test]
    fn appended_turns_round_trip_and_respect_the_window() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(tmp.path().to_path_buf()).expect("store");
        let scope = MemoryScope::Shared;

        for i in 0..5 {
            append_turns(&store, &scope, &[turn(&format!("message {i}"))], 3).expect("append");
        }

        let history = load_conversation(&store, &scope).expect("load");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "message 2");
        assert_eq!(history[2].content, "message 4");
    }

    #[test]
    fn other_memory_keys_survive_appends() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = LocalFileStore::new(tmp.path().to_path_buf()).expect("store");
        let scope = MemoryScope::Shared;

        store
            .write_json(&scope, &json!({"preferences": {"tone": "formal"}}))
            .expect("seed");
        append_turns(&store, &scope, &[turn("hello")], 10).expect("append");

        let document = store.read_json(&scope).expect("read");
        assert_eq!(document["preferences"]["tone"], "formal");
        assert_eq!(document[CONVERSATION_KEY].as_array().map(Vec::len), Some(1));
    }
}
