//! Check endpoint probes.
//!
//! `probe()` is the cheap status-only form (`HEAD`) used in polling loops.
//! `fetch_check()` reads the full JSON body for operators.

use std::time::Duration;

use http_body_util::BodyExt;
use thiserror::Error;
use tracing::debug;

use lagguard_state::CheckResult;

use crate::conn::send;

pub const CHECK_PATH: &str = "/throttler/check";

/// Result of a single check poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 200: safe to proceed with one unit of work.
    Ok,
    /// 404: the throttler has not collected a metric yet.
    Unknown,
    /// Any other status: lag at or above threshold, or otherwise not OK.
    Throttled(u16),
    /// The probe could not be executed (connection error or timeout).
    Unreachable,
}

impl ProbeOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => ProbeOutcome::Ok,
            404 => ProbeOutcome::Unknown,
            other => ProbeOutcome::Throttled(other),
        }
    }

    pub fn is_ok(self) -> bool {
        self == ProbeOutcome::Ok
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed check response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Poll the check endpoint with `HEAD`.
///
/// Never fails: transport problems map to `Unreachable`, which callers
/// treat like any other non-OK answer.
pub async fn probe(address: &str, path: &str, timeout: Duration) -> ProbeOutcome {
    match tokio::time::timeout(timeout, send("HEAD", address, address, path)).await {
        Ok(Ok(resp)) => ProbeOutcome::from_status(resp.status().as_u16()),
        Ok(Err(e)) => {
            debug!(error = %e, %address, "check probe failed");
            ProbeOutcome::Unreachable
        }
        Err(_) => {
            debug!(%address, "check probe timed out");
            ProbeOutcome::Unreachable
        }
    }
}

/// Fetch and decode the full check result with `GET`.
pub async fn fetch_check(
    address: &str,
    path: &str,
    timeout: Duration,
) -> Result<CheckResult, ProbeError> {
    let fetch = async {
        let resp = send("GET", address, address, path).await?;
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?
            .to_bytes();
        Ok::<CheckResult, ProbeError>(serde_json::from_slice(&body)?)
    };

    tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| ProbeError::Timeout(timeout))?
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Serve one canned response per connection, in order, then stop.
    pub async fn serve_statuses(responses: Vec<(u16, &'static str)>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 1024];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let is_head = buf[..n].starts_with(b"HEAD");
                let mut response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                    body.len()
                );
                if !is_head {
                    response.push_str(body);
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        addr.to_string()
    }
}
