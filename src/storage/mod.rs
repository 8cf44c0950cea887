pub mod factory;
pub mod local;
pub mod share;

pub use factory::{is_running_in_cloud, select_backend, should_use_share};
pub use local::LocalFileStore;
pub use share::ShareFileStore;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid user guid `{guid}`: {reason}")]
    InvalidGuid { guid: String, reason: String },
    #[error("invalid storage path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("file not found: {directory}/{file_name}")]
    NotFound {
        directory: String,
        file_name: String,
    },
    #[error("storage backend unavailable at {path}: {reason}")]
    BackendUnavailable { path: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Identity context for memory documents. Every storage call carries its
/// scope explicitly; there is no process-wide "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryScope {
    Shared,
    User(UserGuid),
}

/// Lowercase `8-4-4-4-12` hex identifier for a user's private memory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserGuid(String);

impl UserGuid {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let lowered = raw.to_ascii_lowercase();
        let groups: Vec<&str> = lowered.split('-').collect();
        let widths = [8usize, 4, 4, 4, 12];
        let well_formed = groups.len() == widths.len()
            && groups
                .iter()
                .zip(widths)
                .all(|(group, width)| {
                    group.len() == width && group.chars().all(|ch| ch.is_ascii_hexdigit())
                });
        if !well_formed {
            return Err(StorageError::InvalidGuid {
                guid: raw.to_string(),
                reason: "expected 8-4-4-4-12 hex groups".to_string(),
            });
        }
        Ok(Self(lowered))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProperties {
    pub name: String,
    pub size: u64,
    /// Unix timestamp of the last modification.
    pub modified: i64,
}

/// File-backed store shared by the chat orchestrator and the workflow
/// executors: scoped JSON memory documents plus named files within named
/// logical directories. Backends are interchangeable; callers never depend
/// on whether the store is a mounted cloud share or local disk.
pub trait FileStore: std::fmt::Debug {
    /// Reads the memory document for a scope. A missing document reads as an
    /// empty object.
    fn read_json(&self, scope: &MemoryScope) -> Result<Value, StorageError>;

    fn write_json(&self, scope: &MemoryScope, value: &Value) -> Result<(), StorageError>;

    fn ensure_directory(&self, directory: &str) -> Result<(), StorageError>;

    fn write_file(
        &self,
        directory: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), StorageError>;

    fn read_file(&self, directory: &str, file_name: &str) -> Result<Vec<u8>, StorageError>;

    fn delete_file(&self, directory: &str, file_name: &str) -> Result<(), StorageError>;

    fn list_files(&self, directory: &str) -> Result<Vec<String>, StorageError>;

    fn file_exists(&self, directory: &str, file_name: &str) -> Result<bool, StorageError>;

    fn file_properties(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<Option<FileProperties>, StorageError>;
}
