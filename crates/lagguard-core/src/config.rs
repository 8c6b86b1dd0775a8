//! lagguard.toml configuration parser.
//!
//! The config is parsed once at startup and validated before anything is
//! served. A daemon with an undefined threshold or nothing to monitor
//! refuses to start.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;

const DEFAULT_LISTEN: &str = "0.0.0.0:15000";
const DEFAULT_INTERVAL: &str = "1s";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid threshold {0}: must be a finite value >= 0")]
    InvalidThreshold(f64),
    #[error("no monitored targets configured")]
    NoTargets,
    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
    #[error("sampling interval must be greater than zero")]
    ZeroInterval,
    #[error("query timeout {timeout:?} exceeds sampling interval {interval:?}")]
    TimeoutExceedsInterval { timeout: Duration, interval: Duration },
    #[error("duplicate target name: {0}")]
    DuplicateTarget(String),
    #[error("target {name}: {reason}")]
    InvalidTarget { name: String, reason: String },
    #[error("invalid listen address {0:?}")]
    InvalidListen(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagguardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub throttler: ThrottlerConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottlerConfig {
    /// Lag at or above which checks answer "throttled".
    pub threshold: f64,
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Per-target sample timeout. Defaults to the sampling interval.
    pub query_timeout: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
}

/// How per-target samples fold into the single published value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// The most lagging replica gates admission.
    #[default]
    Max,
    Min,
    Mean,
}

impl Aggregation {
    /// Fold samples into one value. `None` if there is nothing to fold.
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let folded = match self {
            Aggregation::Max => values.iter().copied().fold(f64::MIN, f64::max),
            Aggregation::Min => values.iter().copied().fold(f64::MAX, f64::min),
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
        };
        Some(folded)
    }

    pub fn label(self) -> &'static str {
        match self {
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Mean => "mean",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    #[serde(flatten)]
    pub source: SourceConfig,
}

/// Where a target's lag comes from, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Fixed lag value.
    Static { value: f64 },
    /// Plain-text float served by the replica over HTTP.
    Http { url: String },
    /// File holding the epoch timestamp of the last applied heartbeat.
    Heartbeat { path: PathBuf },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Static { .. } => "static",
            SourceConfig::Http { .. } => "http",
            SourceConfig::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl LagguardConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: LagguardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything the daemon needs before it may serve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.throttler.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }

        let interval = self.interval()?;
        let timeout = self.query_timeout()?;
        if timeout > interval {
            return Err(ConfigError::TimeoutExceedsInterval { timeout, interval });
        }

        self.listen_addr()?;

        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
            validate_target(target)?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        let interval = parse_duration(&self.throttler.interval).ok_or_else(|| {
            ConfigError::InvalidDuration {
                field: "throttler.interval",
                value: self.throttler.interval.clone(),
            }
        })?;
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(interval)
    }

    pub fn query_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.throttler.query_timeout {
            Some(raw) => parse_duration(raw)
                .filter(|d| !d.is_zero())
                .ok_or_else(|| ConfigError::InvalidDuration {
                    field: "throttler.query_timeout",
                    value: raw.clone(),
                }),
            None => self.interval(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListen(self.server.listen.clone()))
    }
}

fn validate_target(target: &TargetConfig) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidTarget {
        name: target.name.clone(),
        reason: reason.to_string(),
    };

    if target.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    match &target.source {
        SourceConfig::Static { value } => {
            if !value.is_finite() || *value < 0.0 {
                return Err(invalid("static value must be a finite value >= 0"));
            }
        }
        SourceConfig::Http { url } => {
            let rest = url
                .strip_prefix("http://")
                .ok_or_else(|| invalid("only http:// urls are supported"))?;
            if rest.is_empty() || rest.starts_with('/') {
                return Err(invalid("url has no host"));
            }
        }
        SourceConfig::Heartbeat { path } => {
            if path.as_os_str().is_empty() {
                return Err(invalid("heartbeat path must not be empty"));
            }
        }
    }
    Ok(())
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}
