pub mod config;
pub mod manager;

pub use config::{
    AuthSettings, ChatConfig, Config, ConfigError, ConfigResult, LlmConfig, LogLevel,
    LoggingConfig, ServerConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// Environment variable naming an alternate config file
pub const CONFIG_ENV: &str = "CHATRELAY_CONFIG";

/// `~/.chatrelay`
pub fn chatrelay_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatrelay"))
}

/// `~/.chatrelay/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    chatrelay_dir().map(|dir| dir.join("config.json"))
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
