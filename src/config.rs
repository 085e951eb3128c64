//! Configuration management for limiters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{LimiterError, Result};
use crate::ratelimit::Rate;

/// Environment variable prefix, e.g. `RATELIMITER_RATE=20`.
pub const ENV_PREFIX: &str = "RATELIMITER";

/// Which admission algorithm fronts the protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Per wall-clock second counter
    FixedWindow,
    /// Steadily refilled token pool
    #[default]
    TokenBucket,
}

impl FromStr for Strategy {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fixed_window" | "fixed" => Ok(Strategy::FixedWindow),
            "token_bucket" | "bucket" => Ok(Strategy::TokenBucket),
            other => Err(LimiterError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::FixedWindow => f.write_str("fixed_window"),
            Strategy::TokenBucket => f.write_str("token_bucket"),
        }
    }
}

/// Limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Admission algorithm
    #[serde(default)]
    pub strategy: Strategy,

    /// Operations per second; must be positive
    #[serde(default = "default_rate")]
    pub rate: i64,

    /// Admit waiting callers in arrival order
    #[serde(default)]
    pub fair: bool,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            rate: default_rate(),
            fair: false,
        }
    }
}

fn default_rate() -> i64 {
    5
}

impl LimiterConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| LimiterError::Config(e.to_string()))
    }

    /// Load configuration from a YAML file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from an optional YAML file, overridden by
    /// `RATELIMITER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| LimiterError::Config(e.to_string()))
    }

    /// Check the configuration, returning the validated rate.
    pub fn validate(&self) -> Result<Rate> {
        Rate::new(self.rate)
    }
}
