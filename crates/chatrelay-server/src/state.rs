use std::sync::Arc;
use std::time::Duration;

use chatrelay_config::{AuthSettings, Config};
use chatrelay_core::RequestDefaults;
use chatrelay_llm::{AuthConfig, LLMProvider, OpenAiProvider, ProviderConfig};
use tracing::{info, warn};

/// Stream relay tuning
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Longest wait for the next upstream item
    pub idle_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared, read-only server state
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<dyn LLMProvider>,
    pub defaults: RequestDefaults,
    pub relay: RelaySettings,
}

impl AppState {
    pub fn new(llm: Arc<dyn LLMProvider>, defaults: RequestDefaults, relay: RelaySettings) -> Self {
        Self { llm, defaults, relay }
    }

    /// Build the upstream client and defaults from configuration.
    ///
    /// `api_key` takes precedence over the key named in the config.
    pub fn from_config(config: &Config, api_key: Option<String>) -> chatrelay_llm::Result<Self> {
        let provider = OpenAiProvider::with_config(provider_config(config, api_key))?;
        info!(provider = %provider.metadata().name, "Upstream client ready");

        Ok(Self::new(
            Arc::new(provider),
            config.request_defaults(),
            RelaySettings {
                idle_timeout: config.chat.stream_idle_timeout(),
            },
        ))
    }
}

fn provider_config(config: &Config, api_key: Option<String>) -> ProviderConfig {
    let llm = &config.llm;

    let auth = match &llm.auth {
        AuthSettings::ApiKey { env } => match api_key.or_else(|| llm.auth.secret()) {
            Some(key) => AuthConfig::ApiKey { key },
            None => {
                warn!("No API key found in ${}; upstream calls are unauthenticated", env);
                AuthConfig::None
            }
        },
        AuthSettings::Header { header, env } => match api_key.or_else(|| llm.auth.secret()) {
            Some(value) => AuthConfig::Header {
                name: header.clone(),
                value,
            },
            None => {
                warn!("No key found in ${} for header {}", env, header);
                AuthConfig::None
            }
        },
        AuthSettings::None => AuthConfig::None,
    };

    ProviderConfig::new(&llm.provider_id, &llm.base_url)
        .with_auth(auth)
        .with_timeout(llm.timeout())
        .with_connect_timeout(llm.connect_timeout())
        .with_max_retries(llm.max_retries)
        .with_stream_usage(llm.stream_usage)
        .with_headers(llm.headers.clone())
}
