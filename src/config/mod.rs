pub mod error;
pub mod load;
pub mod settings;

pub use error::ConfigError;
pub use load::{apply_env_overrides, default_settings_path, load_settings};
pub use settings::Settings;
