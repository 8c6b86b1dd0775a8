//! lagguardd: the lagguard daemon.
//!
//! Single binary that assembles the throttler:
//! - Config loading and validation
//! - Shared throttle state
//! - Metric collector (background task)
//! - Check API (axum)
//!
//! # Usage
//!
//! ```text
//! lagguardd serve --config /etc/lagguard/lagguard.toml
//! lagguardd check --address 127.0.0.1:15000
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lagguard_core::LagguardConfig;
use lagguard_metrics::MetricCollector;
use lagguard_state::{ThresholdConfig, ThrottleState};

const DEFAULT_FILTER: &str = "info,lagguard=debug";

#[derive(Parser)]
#[command(name = "lagguardd", about = "Replication-lag admission control daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect replica lag and serve the check endpoint.
    Serve {
        /// Path to lagguard.toml.
        #[arg(long, default_value = "lagguard.toml")]
        config: PathBuf,

        /// Override `server.listen`.
        #[arg(long)]
        listen: Option<String>,

        /// Override `throttler.threshold`.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Query a running throttler once and print the check result.
    Check {
        /// Throttler address (host:port).
        #[arg(long, default_value = "127.0.0.1:15000")]
        address: String,

        /// Request timeout in milliseconds.
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            listen,
            threshold,
        } => {
            let config = load_config(&config, listen, threshold)?;
            run_serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            address,
            timeout_ms,
        } => run_check(&address, Duration::from_millis(timeout_ms)).await,
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read the config file and apply command-line overrides.
///
/// Validation runs after overrides, so a bad override is as fatal as a
/// bad file.
fn load_config(
    path: &Path,
    listen: Option<String>,
    threshold: Option<f64>,
) -> anyhow::Result<LagguardConfig> {
    let mut config = LagguardConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    if let Some(threshold) = threshold {
        config.throttler.threshold = threshold;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run_serve(config: LagguardConfig) -> anyhow::Result<()> {
    info!("lagguard daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let threshold = ThresholdConfig::new(config.throttler.threshold)?;
    let state = ThrottleState::new(threshold);
    info!(threshold = threshold.threshold, "throttle state initialized");

    let collector = Arc::new(MetricCollector::from_config(state.clone(), &config)?);
    info!(
        targets = config.targets.len(),
        interval_ms = collector.interval().as_millis() as u64,
        "metric collector initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let collector_handle = tokio::spawn({
        let collector = collector.clone();
        async move {
            collector.run(shutdown_rx).await;
        }
    });

    // ── Start API server ───────────────────────────────────────

    let router = lagguard_api::build_router(state, collector.stats());
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "check API listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for the collector to observe shutdown.
    let _ = collector_handle.await;

    info!("lagguard daemon stopped");
    Ok(())
}

async fn run_check(address: &str, timeout: Duration) -> anyhow::Result<ExitCode> {
    let result = lagguard_client::fetch_check(address, lagguard_client::CHECK_PATH, timeout)
        .await
        .with_context(|| format!("checking {address}"))?;

    println!("{}", serde_json::to_string(&result)?);
    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn example_config_is_valid() {
        let config = LagguardConfig::parse(include_str!("../lagguard.toml")).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.throttler.threshold, 1.0);
    }

    #[test]
    fn overrides_are_validated() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/lagguard.toml"));

        let config = load_config(path, Some("127.0.0.1:0".to_string()), Some(0.5)).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:0");
        assert_eq!(config.throttler.threshold, 0.5);

        assert!(load_config(path, None, Some(-1.0)).is_err());
        assert!(load_config(path, Some("nowhere".to_string()), None).is_err());
    }

    #[test]
    fn missing_config_is_fatal() {
        let err = load_config(Path::new("/nonexistent/lagguard.toml"), None, None).unwrap_err();
        assert!(err.to_string().contains("loading"));
    }
}
