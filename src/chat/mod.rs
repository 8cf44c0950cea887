pub mod client;
pub mod dispatch;
pub mod types;

pub use client::HttpChatClient;
pub use dispatch::{run_chat_turn, ChatTurn};
pub use types::{ChatClient, ChatError, ChatMessage, ChatOutcome, ChatRole};
