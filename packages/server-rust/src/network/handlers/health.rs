//! `/health`, `/health/live` and `/health/ready`.
//!
//! Liveness never looks at redirect targets: an unreachable classic node
//! must not get the relay restarted. Readiness is `Ready` and nothing else.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::HealthState;
use crate::redirect::RedirectStatus;

/// Body of `GET /health`, always served with 200.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub state: &'static str,
    pub in_flight: u64,
    pub uptime_secs: u64,
    /// One entry per enabled redirect, sorted by namespace.
    pub redirects: Vec<RedirectStatus>,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        state: state.shutdown.health_state().as_str(),
        in_flight: state.shutdown.in_flight_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        redirects: state.rpc.redirects.statuses(),
    })
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    match state.shutdown.health_state() {
        HealthState::Ready => StatusCode::OK,
        HealthState::Starting | HealthState::Draining | HealthState::Stopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
