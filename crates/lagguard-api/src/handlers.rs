//! HTTP handlers.
//!
//! The check handlers reply with the bare `CheckResult` wire format. The
//! admin handlers use the `ApiResponse` envelope.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use lagguard_state::ThresholdConfig;

use crate::ApiState;

/// Response wrapper for consistent admin API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn http_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// ── Check ──────────────────────────────────────────────────────

/// GET /throttler/check
pub async fn check(State(state): State<ApiState>) -> impl IntoResponse {
    let result = state.throttle.check();
    trace!(status = result.status_code, value = result.value, "check");
    (http_status(result.status_code), Json(result))
}

/// HEAD /throttler/check
pub async fn check_head(State(state): State<ApiState>) -> StatusCode {
    http_status(state.throttle.status().http_status())
}

// ── Threshold ──────────────────────────────────────────────────

/// Answer to a threshold update.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ThresholdUpdate {
    pub threshold: f64,
    pub previous: f64,
}

/// GET /throttler/threshold
pub async fn get_threshold(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.throttle.threshold())
}

/// PUT /throttler/threshold
pub async fn set_threshold(
    State(state): State<ApiState>,
    Json(req): Json<ThresholdConfig>,
) -> impl IntoResponse {
    match state.throttle.set_threshold(req.threshold) {
        Ok(prev) => ApiResponse::ok(ThresholdUpdate {
            threshold: req.threshold,
            previous: prev.threshold,
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "rejected threshold update");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response()
        }
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = lagguard_metrics::render_prometheus(&state.throttle, &state.stats);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
