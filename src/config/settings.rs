use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Process-wide settings, loaded from `~/.flowbot/settings.yaml` with
/// environment overrides applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_chat_endpoint")]
    pub chat_endpoint: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the settings file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Root of local state. Defaults to `~/.flowbot/state` when unset.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_max_dispatch_rounds")]
    pub max_dispatch_rounds: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,
}

fn default_chat_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "FLOWBOT_API_KEY".to_string()
}

fn default_command_timeout() -> u64 {
    60
}

fn default_max_dispatch_rounds() -> usize {
    5
}

fn default_history_window() -> usize {
    40
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_endpoint: default_chat_endpoint(),
            chat_model: default_chat_model(),
            api_key_env: default_api_key_env(),
            storage_root: None,
            command_timeout_seconds: default_command_timeout(),
            max_dispatch_rounds: default_max_dispatch_rounds(),
            history_window: default_history_window(),
            workflows_dir: default_workflows_dir(),
        }
    }
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat_endpoint.is_empty() {
            return Err(ConfigError::Settings(
                "chat_endpoint must be non-empty".to_string(),
            ));
        }
        if self.chat_model.is_empty() {
            return Err(ConfigError::Settings(
                "chat_model must be non-empty".to_string(),
            ));
        }
        if self.command_timeout_seconds == 0 {
            return Err(ConfigError::Settings(
                "command_timeout_seconds must be greater than zero".to_string(),
            ));
        }
        if self.max_dispatch_rounds == 0 {
            return Err(ConfigError::Settings(
                "max_dispatch_rounds must be greater than zero".to_string(),
            ));
        }
        if self.history_window == 0 {
            return Err(ConfigError::Settings(
                "history_window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gets_every_default() {
        let settings: Settings = serde_yaml::from_str("{}").expect("parse");
        assert_eq!(settings.api_key_env, "FLOWBOT_API_KEY");
        assert_eq!(settings.command_timeout_seconds, 60);
        assert_eq!(settings.history_window, 40);
        assert!(settings.storage_root.is_none());
        settings.validate().expect("defaults are valid");
    }

    #[test]
    fn zero_limits_are_rejected() {
        let settings: Settings =
            serde_yaml::from_str("max_dispatch_rounds: 0").expect("parse");
        let err = settings.validate().expect_err("zero rounds");
        assert!(err.to_string().contains("max_dispatch_rounds"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Settings, _> = serde_yaml::from_str("chat_endpint: typo");
        assert!(result.is_err());
    }
}
