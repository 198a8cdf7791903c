//! Structured logging setup

use chatrelay_config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, then `--debug`, then the configured level
pub fn build_filter(config: &LoggingConfig, debug: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = if debug { "debug" } else { config.level.as_str() };
    // actix's own access log is kept at info unless explicitly raised
    EnvFilter::new(format!("{level},actix_server=info"))
}

/// Install the global subscriber. `log` records from dependencies are
/// forwarded through tracing-subscriber's log bridge.
pub fn init_logging(config: &LoggingConfig, debug: bool) -> anyhow::Result<()> {
    let filter = build_filter(config, debug);
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}
