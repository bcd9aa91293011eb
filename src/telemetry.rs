//! Prometheus counters for the REST front door.
//!
//! | Metric | Labels | Description |
//! |--------|--------|-------------|
//! | `gort_requests_total` | `request_uri`, `remote_addr` | Requests to token-protected routes |
//! | `gort_unauthorized_requests_total` | `request_uri`, `remote_addr` | Requests rejected with 401 |
//! | `gort_errors_total` | `kind` | Server-side errors worth an operator's attention |

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const TOTAL_REQUESTS: &str = "gort_requests_total";
pub const UNAUTHORIZED_REQUESTS: &str = "gort_unauthorized_requests_total";
pub const ERRORS: &str = "gort_errors_total";

/// Installs the global Prometheus recorder and returns the handle used by
/// `GET /v2/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Handle to a recorder that is not installed globally.
///
/// Rendering it always yields an empty exposition; used when metrics are
/// disabled and in tests, where only one global recorder may exist per
/// process.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn describe_metrics() {
    describe_counter!(TOTAL_REQUESTS, "Total requests to token-protected endpoints");
    describe_counter!(UNAUTHORIZED_REQUESTS, "Requests rejected for a missing or invalid session token");
    describe_counter!(ERRORS, "Server-side errors by kind");
}

pub fn record_total_request(request_uri: &str, remote_addr: &str) {
    counter!(
        TOTAL_REQUESTS,
        "request_uri" => request_uri.to_string(),
        "remote_addr" => remote_addr.to_string()
    )
    .increment(1);
}

pub fn record_unauthorized_request(request_uri: &str, remote_addr: &str) {
    counter!(
        UNAUTHORIZED_REQUESTS,
        "request_uri" => request_uri.to_string(),
        "remote_addr" => remote_addr.to_string()
    )
    .increment(1);
}

pub fn record_error(kind: &'static str) {
    counter!(ERRORS, "kind" => kind).increment(1);
}
