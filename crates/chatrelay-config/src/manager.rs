use crate::config::{Config, ConfigError, ConfigResult};
use chatrelay_core::validation::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Loads and validates the relay configuration.
///
/// The configuration is read once at startup and never changes afterwards.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config file at `path`. A missing file yields the built-in
    /// defaults; nothing is written to disk.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };

        Self::validate(&config)?;
        debug!("Config loaded: llm.base_url={} llm.model={}", config.llm.base_url, config.llm.model);

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Wrap an in-memory config (used by tests and embedders)
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { path, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply overrides, then re-validate the result
    pub fn update<F>(&mut self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut next = self.config.clone();
        f(&mut next)?;
        Self::validate(&next)?;
        self.config = next;
        Ok(())
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Check the config for values the relay cannot run with
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.server.port == 0 {
            return Err(ConfigError::Validation("Server port cannot be 0".to_string()));
        }

        if config.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url cannot be empty".to_string()));
        }

        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model cannot be empty".to_string()));
        }

        if !config.llm.models.is_empty() && !config.llm.models.contains(&config.llm.model) {
            return Err(ConfigError::Validation(format!(
                "Default model '{}' not found in llm.models",
                config.llm.model
            )));
        }

        if config.llm.timeout_seconds == 0 || config.llm.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "llm timeouts must be greater than 0".to_string(),
            ));
        }

        let temperature = config.chat.temperature;
        if !temperature.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ConfigError::Validation(format!(
                "chat.temperature must be between {} and {}",
                MIN_TEMPERATURE, MAX_TEMPERATURE
            )));
        }

        if config.chat.max_tokens == 0 || config.chat.max_tokens > config.chat.max_tokens_limit {
            return Err(ConfigError::Validation(format!(
                "chat.max_tokens must be between 1 and {}",
                config.chat.max_tokens_limit
            )));
        }

        if config.chat.stream_idle_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "chat.stream_idle_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Expand `${VAR}` and `${VAR:-default}`.
    ///
    /// Inside a JSON string the value is escaped so quotes and backslashes
    /// survive parsing; elsewhere it is spliced as-is.
    pub fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        let mut result = String::with_capacity(content.len());
        let mut last = 0;
        let mut in_string = false;

        for cap in re.captures_iter(content) {
            let (Some(full), Some(expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            let (var_name, default_value) = match expr.as_str().split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (expr.as_str(), None),
            };

            let value = match (std::env::var(var_name), default_value) {
                (Ok(val), _) => val,
                (Err(_), Some(default)) => default.to_string(),
                (Err(_), None) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
            };

            let preceding = &content[last..full.start()];
            in_string = ends_in_string(preceding, in_string);

            result.push_str(preceding);
            if in_string {
                let quoted = serde_json::to_string(&value)?;
                result.push_str(&quoted[1..quoted.len() - 1]);
            } else {
                result.push_str(&value);
            }
            last = full.end();
        }
        result.push_str(&content[last..]);

        Ok(result)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether a JSON scanner is inside a string after reading `text`
fn ends_in_string(text: &str, mut in_string: bool) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ => {}
        }
    }
    in_string
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthSettings, LogLevel};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&path).await.unwrap();

        assert_eq!(manager.config(), &Config::default());
        assert_eq!(manager.path(), path.as_path());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{"port": 9090}},
                "llm": {{
                    "base_url": "http://localhost:11434/v1",
                    "model": "llama3",
                    "models": ["llama3", "mistral"],
                    "auth": {{"auth_type": "none"}}
                }},
                "logging": {{"level": "debug", "json": true}}
            }}"#
        )
        .unwrap();

        let config = ConfigManager::load(file.path()).await.unwrap().into_config();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.models.len(), 2);
        assert_eq!(config.llm.auth, AuthSettings::None);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.json);
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let result = ConfigManager::load(file.path()).await;
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"chat": {{"temperature": 3.5}}}}"#).unwrap();

        let result = ConfigManager::load(file.path()).await;
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate() {
        assert!(ConfigManager::validate(&Config::default()).is_ok());

        let mut config = Config::default();
        config.server.port = 0;
        assert!(ConfigManager::validate(&config).is_err());

        let mut config = Config::default();
        config.llm.models = vec!["gpt-4o".to_string()];
        assert!(ConfigManager::validate(&config).is_err());

        let mut config = Config::default();
        config.chat.max_tokens = config.chat.max_tokens_limit + 1;
        assert!(ConfigManager::validate(&config).is_err());

        let mut config = Config::default();
        config.chat.stream_idle_timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[test]
    fn test_update_revalidates() {
        let mut manager = ConfigManager::new(Config::default(), PathBuf::from("config.json"));

        manager
            .update(|c| c.set_value("llm.model", "gpt-4o"))
            .unwrap();
        assert_eq!(manager.config().llm.model, "gpt-4o");

        let result = manager.update(|c| c.set_value("server.port", "0"));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
        assert_eq!(manager.config().server.port, 8081);
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("CHATRELAY_TEST_BASE", "http://proxy:8080/v1");

        let expanded = ConfigManager::expand_env_vars(
            r#"{"base_url": "${CHATRELAY_TEST_BASE}", "model": "${CHATRELAY_TEST_UNSET_MODEL:-gpt-4o}"}"#,
        )
        .unwrap();

        assert_eq!(
            expanded,
            r#"{"base_url": "http://proxy:8080/v1", "model": "gpt-4o"}"#
        );

        std::env::remove_var("CHATRELAY_TEST_BASE");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = ConfigManager::expand_env_vars(r#"{"key": "${CHATRELAY_TEST_DEFINITELY_UNSET}"}"#);
        assert!(matches!(
            result,
            Err(ConfigError::EnvVarNotFound(ref name)) if name == "CHATRELAY_TEST_DEFINITELY_UNSET"
        ));
    }

    #[test]
    fn test_expand_env_vars_escapes_values_in_strings() {
        std::env::set_var("CHATRELAY_TEST_QUOTED", r#"C:\keys\"prod""#);

        let expanded = ConfigManager::expand_env_vars(
            r#"{"env": "${CHATRELAY_TEST_QUOTED}", "note": "a \" ${CHATRELAY_TEST_QUOTED}", "port": ${CHATRELAY_TEST_UNSET_PORT:-9000}}"#,
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&expanded).unwrap();

        assert_eq!(value["env"], r#"C:\keys\"prod""#);
        assert_eq!(value["note"], r#"a " C:\keys\"prod""#);
        assert_eq!(value["port"], 9000);

        std::env::remove_var("CHATRELAY_TEST_QUOTED");
    }

    #[test]
    fn test_expand_env_vars_no_placeholders() {
        let content = r#"{"server": {"port": 8081}}"#;
        assert_eq!(ConfigManager::expand_env_vars(content).unwrap(), content);
    }
}
