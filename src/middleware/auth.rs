use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::SESSION_TOKEN_HEADER;
use crate::dataaccess::SharedDataAccess;
use crate::telemetry;

use super::audit::UNKNOWN;

/// Routes reachable without a session token.
pub const DEFAULT_EXEMPT_PATHS: [&str; 4] = [
    "/v2/authenticate",
    "/v2/bootstrap",
    "/v2/healthz",
    "/v2/metrics",
];

/// State for [`session_token_middleware`]: the token store and the exempt
/// route set.
#[derive(Clone)]
pub struct TokenGate {
    dal: SharedDataAccess,
    exempt: Arc<HashSet<String>>,
}

impl TokenGate {
    pub fn new<I, P>(dal: SharedDataAccess, exempt_paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            dal,
            exempt: Arc::new(exempt_paths.into_iter().map(Into::into).collect()),
        }
    }

    /// Exemption is decided on the path alone; query strings never count.
    pub fn is_exempt(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.exempt.contains(path)
    }

    async fn is_authorized(&self, token: Option<&str>) -> bool {
        match token {
            Some(token) if !token.is_empty() => self.dal.token_evaluate(token).await,
            _ => false,
        }
    }
}

/// Session token middleware.
///
/// Exempt routes pass straight through without touching the token store.
/// Everything else counts toward the total request metric and must carry an
/// `X-Session-Token` that the token store accepts; otherwise the request is
/// answered with 401 and the handler never runs.
pub async fn session_token_middleware(
    State(gate): State<TokenGate>,
    request: Request,
    next: Next,
) -> Response {
    if gate.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let request_uri = request.uri().to_string();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    telemetry::record_total_request(&request_uri, &remote_addr);

    let token = request
        .headers()
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if !gate.is_authorized(token).await {
        telemetry::record_unauthorized_request(&request_uri, &remote_addr);
        tracing::debug!(request_uri = %request_uri, remote_addr = %remote_addr, "Rejected unauthenticated request");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    next.run(request).await
}
