use crate::storage::local::LocalFileStore;
use crate::storage::{FileProperties, FileStore, MemoryScope, StorageError};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Store backed by a mounted cloud file share. The mount point must already
/// exist; this backend never creates it, since a missing mount means the
/// share is not attached and writing would silently land on local disk.
/// Within the mount, layout and semantics match the local backend.
#[derive(Debug)]
pub struct ShareFileStore {
    inner: LocalFileStore,
    mount_root: PathBuf,
}

impl ShareFileStore {
    pub fn new(mount_root: PathBuf) -> Result<Self, StorageError> {
        if !mount_root.is_dir() {
            return Err(StorageError::BackendUnavailable {
                path: mount_root.display().to_string(),
                reason: "share mount point does not exist".to_string(),
            });
        }
        Ok(Self {
            inner: LocalFileStore::new(mount_root.clone())?,
            mount_root,
        })
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }
}

impl FileStore for ShareFileStore {
    fn read_json(&self, scope: &MemoryScope) -> Result<Value, StorageError> {
        self.inner.read_json(scope)
    }

    fn write_json(&self, scope: &MemoryScope, value: &Value) -> Result<(), StorageError> {
        self.inner.write_json(scope, value)
    }

    fn ensure_directory(&self, directory: &str) -> Result<(), StorageError> {
        self.inner.ensure_directory(directory)
    }

    fn write_file(
        &self,
        directory: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<(), StorageError> {
        self.inner.write_file(directory, file_name, content)
    }

    fn read_file(&self, directory: &str, file_name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read_file(directory, file_name)
    }

    fn delete_file(&self, directory: &str, file_name: &str) -> Result<(), StorageError> {
        self.inner.delete_file(directory, file_name)
    }

    fn list_files(&self, directory: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_files(directory)
    }

    fn file_exists(&self, directory: &str, file_name: &str) -> Result<bool, StorageError> {
        self.inner.file_exists(directory, file_name)
    }

    fn file_properties(
        &self,
        directory: &str,
        file_name: &str,
    ) -> Result<Option<FileProperties>, StorageError> {
        self.inner.file_properties(directory, file_name)
    }
}
