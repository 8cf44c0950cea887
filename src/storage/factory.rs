use crate::storage::local::LocalFileStore;
use crate::storage::share::ShareFileStore;
use crate::storage::{FileStore, StorageError};
use std::path::PathBuf;

/// Environment variables set by the cloud function host. Any of them present
/// means we are running in the managed environment.
const CLOUD_INDICATORS: [&str; 3] = [
    "WEBSITE_INSTANCE_ID",
    "FUNCTIONS_WORKER_RUNTIME",
    "WEBSITE_SITE_NAME",
];

/// Mount point of the cloud file share, when one is attached.
pub const SHARE_MOUNT_ENV: &str = "FLOWBOT_SHARE_MOUNT";

pub fn is_running_in_cloud() -> bool {
    is_running_in_cloud_from(&env_lookup)
}

pub fn should_use_share() -> bool {
    should_use_share_from(&env_lookup)
}

/// Selects the storage backend at process start: the mounted share when we
/// are in the cloud or one is explicitly configured, local disk otherwise.
/// Outside the cloud a broken share configuration falls back to local disk;
/// inside the cloud it is a hard error, because memory written locally there
/// would be lost on the next instance recycle.
pub fn select_backend(local_root: PathBuf) -> Result<Box<dyn FileStore>, StorageError> {
    select_backend_from(&env_lookup, local_root)
}

pub(crate) fn is_running_in_cloud_from(env: &dyn Fn(&str) -> Option<String>) -> bool {
    CLOUD_INDICATORS
        .iter()
        .any(|name| env(name).is_some_and(|value| !value.is_empty()))
}

pub(crate) fn should_use_share_from(env: &dyn Fn(&str) -> Option<String>) -> bool {
    if is_running_in_cloud_from(env) {
        return true;
    }
    env(SHARE_MOUNT_ENV).is_some_and(|value| !value.is_empty())
}

pub(crate) fn select_backend_from(
    env: &dyn Fn(&str) -> Option<String>,
    local_root: PathBuf,
) -> Result<Box<dyn FileStore>, StorageError> {
    if should_use_share_from(env) {
        let mount = env(SHARE_MOUNT_ENV).filter(|value| !value.is_empty());
        let attempt = mount
            .map(PathBuf::from)
            .ok_or_else(|| StorageError::BackendUnavailable {
                path: SHARE_MOUNT_ENV.to_string(),
                reason: "share mount is not configured".to_string(),
            })
            .and_then(ShareFileStore::new);
        match attempt {
            Ok(store) => return Ok(Box::new(store)),
            Err(err) if is_running_in_cloud_from(env) => return Err(err),
            Err(_) => {}
        }
    }
    Ok(Box::new(LocalFileStore::new(local_root)?))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
