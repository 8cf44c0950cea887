pub mod agents;
pub mod chat;
pub mod config;
pub mod memory;
pub mod shared;
pub mod storage;
pub mod workflow;
