//! lagguard-api: HTTP surface of the throttler.
//!
//! Every handler reads the shared `ThrottleState` and answers right away;
//! none of them waits for the collector.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/throttler/check` | Check result as JSON, HTTP status = `StatusCode` |
//! | HEAD | `/throttler/check` | Same status, no body |
//! | GET | `/throttler/threshold` | Current threshold |
//! | PUT | `/throttler/threshold` | Replace the local threshold |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use lagguard_metrics::CollectorStats;
use lagguard_state::ThrottleState;

pub const CHECK_PATH: &str = "/throttler/check";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub throttle: ThrottleState,
    pub stats: CollectorStats,
}

/// Build the complete router (check + admin + metrics).
pub fn build_router(throttle: ThrottleState, stats: CollectorStats) -> Router {
    let api_state = ApiState { throttle, stats };

    Router::new()
        .route(CHECK_PATH, get(handlers::check).head(handlers::check_head))
        .route(
            "/throttler/threshold",
            get(handlers::get_threshold).put(handlers::set_threshold),
        )
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(api_state)
}
