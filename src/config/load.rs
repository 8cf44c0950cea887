use crate::config::{ConfigError, Settings};
use std::path::PathBuf;

pub const STATE_DIR: &str = ".flowbot";
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::HomeDirectoryUnavailable)?;
    Ok(PathBuf::from(home).join(STATE_DIR).join(SETTINGS_FILE_NAME))
}

/// Loads settings from the default path. A missing file means defaults; a
/// present but unreadable or invalid file is an error.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let path = default_settings_path()?;
    let mut settings = if path.is_file() {
        Settings::from_path(&path)?
    } else {
        Settings::default()
    };
    apply_env_overrides_from(&mut settings, &|name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

/// Applies `FLOWBOT_*` environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_env_overrides_from(settings, &|name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_from(
    settings: &mut Settings,
    env: &dyn Fn(&str) -> Option<String>,
) {
    if let Some(endpoint) = env("FLOWBOT_CHAT_ENDPOINT").filter(|v| !v.is_empty()) {
        settings.chat_endpoint = endpoint;
    }
    if let Some(model) = env("FLOWBOT_CHAT_MODEL").filter(|v| !v.is_empty()) {
        settings.chat_model = model;
    }
    if let Some(root) = env("FLOWBOT_STORAGE_ROOT").filter(|v| !v.is_empty()) {
        settings.storage_root = Some(PathBuf::from(root));
    }
    if let Some(dir) = env("FLOWBOT_WORKFLOWS_DIR").filter(|v| !v.is_empty()) {
        settings.workflows_dir = PathBuf::from(dir);
    }
}
