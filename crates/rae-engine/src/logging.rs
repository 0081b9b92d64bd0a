use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};
use crate::error::{ConfigError, EngineError};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails with
/// [`EngineError::Logging`] when a subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<(), EngineError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|_| ConfigError::InvalidValue {
            name: "log.level",
            value: config.level.clone(),
            expected: "an EnvFilter directive such as `info` or `rae_engine=debug`",
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| EngineError::Logging(e.to_string()))
}
