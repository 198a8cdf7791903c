use std::path::PathBuf;

use anyhow::Context;
use chatrelay_config::{ConfigError, ConfigManager, CONFIG_ENV};
use chatrelay_server::logging::init_logging;
use chatrelay_server::{run_server, AppState};
use clap::Parser;
use tracing::{debug, info};

#[derive(Parser, Debug, Clone)]
#[command(name = "chatrelay-server")]
#[command(about = "Chat relay for OpenAI-compatible completion APIs")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Bind address (overrides config)
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Server port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Upstream API base URL (overrides config)
    #[arg(long, env = "LLM_BASE_URL")]
    base_url: Option<String>,

    /// Default model (overrides config)
    #[arg(long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Upstream API key (overrides the key named in config)
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Config file path, defaults to ~/.chatrelay/config.json
    #[arg(long, env = CONFIG_ENV)]
    config: Option<String>,

    /// Override any config value, e.g. --set chat.max_tokens=512
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => chatrelay_config::expand_tilde(path)
                .with_context(|| format!("cannot resolve config path {path}")),
            None => chatrelay_config::default_config_path()
                .context("cannot locate home directory for the default config path"),
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path()?;
    let mut manager = ConfigManager::load(&config_path)
        .await
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    manager
        .update(|config| {
            for entry in &cli.overrides {
                let (key, value) = entry.split_once('=').ok_or_else(|| {
                    ConfigError::Validation(format!("expected KEY=VALUE, got {entry}"))
                })?;
                config.set_value(key.trim(), value)?;
            }
            if let Some(host) = &cli.host {
                config.server.host = host.clone();
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(base_url) = &cli.base_url {
                config.llm.base_url = base_url.clone();
            }
            if let Some(model) = &cli.model {
                config.llm.model = model.clone();
            }
            if let Some(level) = &cli.log_level {
                config.logging.level = level.parse()?;
            }
            Ok(())
        })
        .context("invalid configuration")?;

    let config = manager.config();
    init_logging(&config.logging, cli.debug)?;

    info!("Config: {}", manager.path().display());
    info!("Upstream: {} (default model {})", config.llm.base_url, config.llm.model);
    debug!(
        timeout = config.llm.timeout_seconds,
        connect_timeout = config.llm.connect_timeout_seconds,
        max_retries = config.llm.max_retries,
        idle_timeout = config.chat.stream_idle_timeout_seconds,
        "Upstream limits"
    );

    let state = AppState::from_config(config, cli.api_key.clone())
        .context("failed to build upstream client")?;

    run_server(state, &config.server.host, config.server.port).await?;
    Ok(())
}
