use crate::shared::fs_atomic::atomic_write_file;
use crate::storage::{FileProperties, FileStore, MemoryScope, StorageError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

const SHARED_MEMORY_DIR: &str = "shared_memories";
const SHARED_MEMORY_FILE: &str = "memory.json";
const USER_MEMORY_DIR: &str = "memory";
const USER_MEMORY_FILE: &str = "user_memory.json";

/// Filesystem-backed store rooted at a single directory. Memory documents
/// live under `shared_memories/memory.json` and `memory/<guid>/user_memory.json`;
/// named files live under their logical directory relative to the root.
#[derive(Debug)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).map_err(|err| io_error(&root, err))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn memory_path(&self, scope: &MemoryScope) -> PathBuf {
        match scope {
            MemoryScope::Shared => self.root.join(SHARED_MEMORY_DIR).join(SHARED_MEMORY_FILE),
            MemoryScope::User(guid) => self
                .root
                .join(USER_MEMORY_DIR)
                .join(guid.as_str())
                .join(USER_MEMORY_FILE),
        }
    }

    fn resolve(&self, directory: &str, file_name: Option<&str>) -> Result<PathBuf, StorageError> {
        let mut path = self.root.join(sanitized(directory)?);
        if let Some(file_name) = file_name {
            if file_name.is_empty() || file_name.contains('/') || file_name.contains('\\') {
                return Err(StorageError::InvalidPath {
                    path: file_name.to_string(),
                    reason: "file name must be a single path component".to_string(),
                });
            }
            path = path.join(file_name);
        }
        Ok(path)
    }
}

// Logical directories may nest (`a/b/c`) but never escape the root.
fn sanitized(directory: &str) -> Result<&Path, StorageError> {
    let path = Path::new(directory);
    let safe = !directory.is_empty()
        && path.components().all(|component| {
            matches!(component, Component::Normal(_))
        });
    if !safe {
        return Err(StorageError::InvalidPath {
            path: directory.to_string(),
            reason: "directory must be a relative path without `..` segments".to_string(),
        });
    }
    Ok(path)
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StorageError {
    StorageError::Json {
        path: path.display().to_string(),
        source,
    }
}

impl FileStore for LocalFileStore {
    fn read_json(&self, scope: &MemoryScope) -> Result<Value, StorageError> {
        let path = self.memory_path(scope);
        if !path.is_file() {
            return Ok(Value::Object(Map::new()));
        }
        let raw = fs::read_to_string(&path).map_err(|err| io_error(&path, err))?;
        serde_json::from_str(&raw).map_err(|err| json_error(&path, err))
    }

    fn write_json(&self, scope: &MemoryScope, value: &Value) -> Result<(), StorageError> {
        let path = self.memory_path(scope);
        let rendered = serde_json::to_vec_pretty(value).map_err(|err| json_error(&path, err))?;
        atomic_write_file(&path, &rendered).map_err(|err| io_error(&path, err))
    }

    fn ensure_directory(&self, directory: &str) -> Result<(), StorageError> {
        let path = self.resolve(directory, None)?;
        fs::create_dir_all(&path).map_err(|err| io_error(&path, err))
    }

    fn write_file(
        &self,
        directory: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), StorageError> {
        let path = self.resolve(directory, Some(file_name))?;
        atomic_write_file(&path, content).map_err(|err| io_error(&path, err))
    }

    fn read_file(&self, directory: &str, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(directory, Some(file_name))?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                directory: directory.to_string(),
                file_name: file_name.to_string(),
            });
        }
        fs::read(&path).map_err(|err| io_error(&path, err))
    }

    fn delete_file(&self, directory: &str, file_name: &str) -> Result<(), StorageError> {
        let path = self.resolve(directory, Some(file_name))?;
        if !path.is_file() {
            return Err(StorageError::NotFound {
                directory: directory.to_string(),
                file_name: file_name.to_string(),
            });
        }
        fs::remove_file(&path).map_err(|err| io_error(&path, err))
    }

    fn list_files(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        let path = self.resolve(directory, None)?;
        if !path.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&path).map_err(|err| io_error(&path, err))? {
            let entry = entry.map_err(|err| io_error(&path, err))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_exists(&self, directory: &str, file_name: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(directory, Some(file_name))?.is_file())
    }

    fn file_properties(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<Option<FileProperties>, StorageError> {
        let path = self.resolve(directory, Some(file_name))?;
        if !path.is_file() {
            return Ok(None);
        }
        let metadata = fs::metadata(&path).map_err(|err| io_error(&path, err))?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs() as i64)
            .unwrap_or(0);
        Ok(Some(FileProperties {
            name: file_name.to_string(),
            size: metadata.len(),
            modified,
        }))
    }
}
