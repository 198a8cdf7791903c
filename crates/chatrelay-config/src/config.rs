use chatrelay_core::RequestDefaults;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Option defaults and limits applied to caller requests
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            model: self.llm.model.clone(),
            allowed_models: self.llm.models.clone(),
            temperature: self.chat.temperature,
            max_tokens: self.chat.max_tokens,
            max_tokens_limit: self.chat.max_tokens_limit,
        }
    }

    /// Set a value by dotted key, e.g. `llm.model` or `server.port`
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["server", "host"] => {
                self.server.host = value.to_string();
            }
            ["server", "port"] => {
                self.server.port = parse(key, value)?;
            }
            ["llm", "provider_id"] => {
                self.llm.provider_id = value.to_string();
            }
            ["llm", "base_url"] => {
                self.llm.base_url = value.to_string();
            }
            ["llm", "model"] => {
                self.llm.model = value.to_string();
            }
            ["llm", "models"] => {
                self.llm.models = value
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["llm", "timeout_seconds"] => {
                self.llm.timeout_seconds = parse(key, value)?;
            }
            ["llm", "connect_timeout_seconds"] => {
                self.llm.connect_timeout_seconds = parse(key, value)?;
            }
            ["llm", "max_retries"] => {
                self.llm.max_retries = parse(key, value)?;
            }
            ["llm", "stream_usage"] => {
                self.llm.stream_usage = parse(key, value)?;
            }
            ["llm", "headers", name] => {
                self.llm.headers.insert(name.to_string(), value.to_string());
            }
            ["chat", "temperature"] => {
                self.chat.temperature = parse(key, value)?;
            }
            ["chat", "max_tokens"] => {
                self.chat.max_tokens = parse(key, value)?;
            }
            ["chat", "max_tokens_limit"] => {
                self.chat.max_tokens_limit = parse(key, value)?;
            }
            ["chat", "stream_idle_timeout_seconds"] => {
                self.chat.stream_idle_timeout_seconds = parse(key, value)?;
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "json"] => {
                self.logging.json = parse(key, value)?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid value for {}: {}", key, value)))
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
        }
    }
}

/// Upstream completion service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider_id: String,
    pub base_url: String,
    /// Model used when the caller names none
    pub model: String,
    /// Models callers may pick; empty allows any
    pub models: Vec<String>,
    pub auth: AuthSettings,
    pub headers: HashMap<String, String>,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub max_retries: u32,
    /// Ask for a trailing usage chunk on streams
    pub stream_usage: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_id: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            models: Vec::new(),
            auth: AuthSettings::default(),
            headers: HashMap::new(),
            timeout_seconds: 60,
            connect_timeout_seconds: 10,
            max_retries: 2,
            stream_usage: true,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Authentication settings. Secrets are never stored in the file; the file
/// names the environment variable holding them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthSettings {
    /// `Authorization: Bearer <key>`
    ApiKey {
        env: String,
    },
    /// Key sent in a custom header
    Header {
        header: String,
        env: String,
    },
    /// No authentication
    None,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self::ApiKey {
            env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl AuthSettings {
    /// Read the secret from the environment if applicable
    pub fn secret(&self) -> Option<String> {
        match self {
            Self::ApiKey { env } | Self::Header { env, .. } => {
                std::env::var(env).ok().filter(|v| !v.is_empty())
            }
            Self::None => None,
        }
    }
}

/// Request defaults and relay behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tokens_limit: u32,
    /// Longest wait for the next upstream stream item
    pub stream_idle_timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            max_tokens_limit: 16384,
            stream_idle_timeout_seconds: 60,
        }
    }
}

impl ChatConfig {
    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

/// Log level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
