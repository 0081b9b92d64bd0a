use std::path::Path;
use std::str::FromStr;

use rae_lang::Options;
use serde::{Deserialize, Serialize};

use crate::candidate::CandidateOrder;
use crate::error::ConfigError;
use crate::planner::PlannerConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub candidate_order: CandidateOrder,
    pub interpreter: Options,
    /// Upper bound on engine ticks for [`crate::Rae::run`]. Unbounded when `None`.
    pub max_ticks: Option<u64>,
    pub planner: PlannerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                name: "RAE_LOG_FORMAT",
                value: s.to_string(),
                expected: "one of: text, plain, json",
            }),
        }
    }
}

impl Config {
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Applies `RAE_*` environment variables on top of `self`.
    ///
    /// | variable                  | field                              |
    /// |---------------------------|------------------------------------|
    /// | `RAE_LOG_LEVEL`           | `log.level`                        |
    /// | `RAE_LOG_FORMAT`          | `log.format`                       |
    /// | `RAE_SEED`                | `candidate_order` (shuffled)       |
    /// | `RAE_MAX_TICKS`           | `max_ticks`                        |
    /// | `RAE_MAX_LOOP_ITERATIONS` | `interpreter.max_loop_iterations`  |
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::with_env_overrides`] with a custom variable lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("RAE_LOG_LEVEL") {
            self.log.level = level;
        }

        if let Some(format) = lookup("RAE_LOG_FORMAT") {
            self.log.format = format.parse()?;
        }

        if let Some(seed) = lookup("RAE_SEED") {
            self.candidate_order = CandidateOrder::Shuffled {
                seed: parse_number("RAE_SEED", &seed)?,
            };
        }

        if let Some(max_ticks) = lookup("RAE_MAX_TICKS") {
            self.max_ticks = Some(parse_number("RAE_MAX_TICKS", &max_ticks)?);
        }

        if let Some(max) = lookup("RAE_MAX_LOOP_ITERATIONS") {
            self.interpreter.max_loop_iterations =
                Some(parse_number("RAE_MAX_LOOP_ITERATIONS", &max)?);
        }

        Ok(self)
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            expected: "a non-negative integer",
        })
}
