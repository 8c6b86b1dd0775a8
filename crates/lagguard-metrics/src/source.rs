//! Replica lag sources.
//!
//! A `MetricSource` answers one question: how far behind is this replica
//! right now, in seconds. Each monitored target owns one source, picked
//! by the `kind` in its config.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http_body_util::BodyExt;
use thiserror::Error;
use tracing::debug;

use lagguard_client::{ProbeError, conn};
use lagguard_core::{SourceConfig, TargetConfig};

pub type SampleFuture<'a> =
    Pin<Box<dyn Future<Output = Result<f64, SampleError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("unparsable lag value {0:?}")]
    Parse(String),
    #[error("negative lag value {0}")]
    Negative(f64),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sample timed out after {0:?}")]
    Timeout(Duration),
    #[error("sampling task failed: {0}")]
    Task(String),
}

impl From<ProbeError> for SampleError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Connect { address, reason } => SampleError::Connect { address, reason },
            ProbeError::Request(reason) => SampleError::Request(reason),
            ProbeError::Timeout(after) => SampleError::Timeout(after),
            ProbeError::Decode(e) => SampleError::Parse(e.to_string()),
        }
    }
}

/// Capability to measure one replica's lag.
pub trait MetricSource: Send + Sync {
    /// Current lag in seconds.
    fn sample(&self) -> SampleFuture<'_>;

    fn kind(&self) -> &'static str;
}

/// A named replica and the source that measures it.
#[derive(Clone)]
pub struct MonitoredTarget {
    pub name: String,
    pub source: Arc<dyn MetricSource>,
}

impl MonitoredTarget {
    pub fn new(name: impl Into<String>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, SampleError> {
        let source: Arc<dyn MetricSource> = match &config.source {
            SourceConfig::Static { value } => Arc::new(StaticSource::new(*value)),
            SourceConfig::Http { url } => Arc::new(HttpSource::new(url)?),
            SourceConfig::Heartbeat { path } => Arc::new(HeartbeatSource::new(path.clone())),
        };
        Ok(Self::new(config.name.clone(), source))
    }
}

// ── Static ─────────────────────────────────────────────────────

/// Always reports the same lag.
pub struct StaticSource {
    value: f64,
}

impl StaticSource {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl MetricSource for StaticSource {
    fn sample(&self) -> SampleFuture<'_> {
        let value = self.value;
        Box::pin(async move { Ok(value) })
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

// ── HTTP ───────────────────────────────────────────────────────

/// Fetches a plain-text lag value from a replica status endpoint.
pub struct HttpSource {
    /// host:port to connect to.
    address: String,
    /// Value for the `host` header.
    authority: String,
    path: String,
}

impl HttpSource {
    pub fn new(url: &str) -> Result<Self, SampleError> {
        let uri: http::Uri = url
            .parse()
            .map_err(|_| SampleError::InvalidUrl(url.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(SampleError::InvalidUrl(url.to_string()));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| SampleError::InvalidUrl(url.to_string()))?;
        let address = format!("{}:{}", authority.host(), uri.port_u16().unwrap_or(80));
        let mut path = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        if let Some(query) = uri.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            address,
            authority: authority.as_str().to_string(),
            path,
        })
    }

    async fn fetch(&self) -> Result<f64, SampleError> {
        let resp = conn::send("GET", &self.address, &self.authority, &self.path).await?;

        if !resp.status().is_success() {
            debug!(status = %resp.status(), address = %self.address, "lag endpoint non-2xx");
            return Err(SampleError::Status(resp.status().as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| SampleError::Request(e.to_string()))?
            .to_bytes();

        parse_lag(&String::from_utf8_lossy(&body))
    }
}

impl MetricSource for HttpSource {
    fn sample(&self) -> SampleFuture<'_> {
        Box::pin(self.fetch())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

// ── Heartbeat ──────────────────────────────────────────────────

/// Derives lag from the timestamp of the last heartbeat a replica applied.
///
/// The file holds a unix timestamp in seconds (fractions allowed). Lag is
/// the age of that timestamp, floored at zero for clock skew.
pub struct HeartbeatSource {
    path: PathBuf,
}

impl HeartbeatSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read(&self) -> Result<f64, SampleError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SampleError::Io {
                path: self.path.clone(),
                source,
            })?;
        let heartbeat = parse_number(&content)?;
        Ok((epoch_secs_f64() - heartbeat).max(0.0))
    }
}

impl MetricSource for HeartbeatSource {
    fn sample(&self) -> SampleFuture<'_> {
        Box::pin(self.read())
    }

    fn kind(&self) -> &'static str {
        "heartbeat"
    }
}

fn parse_number(raw: &str) -> Result<f64, SampleError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SampleError::Parse(trimmed.to_string()))
}

/// A replica reporting negative lag is broken, not ahead.
fn parse_lag(raw: &str) -> Result<f64, SampleError> {
    let lag = parse_number(raw)?;
    if lag < 0.0 {
        return Err(SampleError::Negative(lag));
    }
    Ok(lag)
}

fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
