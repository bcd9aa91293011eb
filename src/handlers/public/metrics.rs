// handlers/public/metrics.rs - GET /v2/metrics

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Prometheus text exposition of the service counters.
pub async fn metrics_get(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
}
