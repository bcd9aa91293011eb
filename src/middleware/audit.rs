//! Request audit recorder.
//!
//! Every request produces exactly one [`RequestEvent`] on the event conduit,
//! whether the handler chain returns normally, panics, or is abandoned by
//! the transport. The conduit is a bounded `broadcast` ring: producers never
//! block, and when the consumer falls behind the oldest events are dropped
//! and reported as lag by [`spawn_request_logger`].
//!
//! # Flow
//!
//! 1. Capture the request line, peer address and session token
//! 2. Run the inner service, catching panics as unclassified errors
//! 3. Resolve the caller's identity from the token store (`-` if unknown)
//! 4. Wrap the response in the status observer; the event is emitted once
//!    the body has been written or dropped

use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::task::{Context, Poll};

use axum::{
    extract::{ConnectInfo, Request},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::{Layer, Service};
use tracing::{debug, info, warn};

use super::observer::StatusCapture;
use crate::auth::SESSION_TOKEN_HEADER;
use crate::dataaccess::SharedDataAccess;
use crate::error::ApiError;

/// Placeholder for an unknown caller identity or peer address.
pub const UNKNOWN: &str = "-";

/// Immutable record of one completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub addr: String,
    pub user_id: String,
    pub timestamp: DateTime<Local>,
    pub request: String,
    pub status: u16,
    pub size: u64,
}

impl fmt::Display for RequestEvent {
    /// Common Log Format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

        write!(
            f,
            "{} - {} [{}] {:?} {} {}",
            self.addr,
            self.user_id,
            self.timestamp.format(DATE_FORMAT),
            self.request,
            self.status,
            self.size
        )
    }
}

/// Producer side of the event conduit plus the token store used to resolve
/// identities.
#[derive(Clone)]
pub struct AuditSink {
    dal: SharedDataAccess,
    events: broadcast::Sender<RequestEvent>,
}

impl AuditSink {
    pub fn new(dal: SharedDataAccess, events: broadcast::Sender<RequestEvent>) -> Self {
        Self { dal, events }
    }

    /// Username bound to a live `token`, or [`UNKNOWN`]. Expired tokens
    /// resolve to nobody, and lookup failures never propagate.
    async fn resolve_identity(&self, token: Option<&str>) -> String {
        let Some(token) = token else {
            return UNKNOWN.to_string();
        };

        match self.dal.token_retrieve_by_token(token).await {
            Ok(token) if !token.user.is_empty() && !token.is_expired() => token.user,
            Ok(_) => UNKNOWN.to_string(),
            Err(e) => {
                debug!("Audit identity lookup failed: {}", e);
                UNKNOWN.to_string()
            }
        }
    }

    fn emit(&self, event: RequestEvent) {
        if self.events.send(event).is_err() {
            debug!("Request event dropped: no audit consumer");
        }
    }
}

/// Per-request data collected before the handler chain runs.
struct PendingEvent {
    addr: String,
    request: String,
    token: Option<String>,
}

impl PendingEvent {
    fn from_request(request: &Request) -> Self {
        let addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let uri = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| request.uri().path());

        let request_line = format!("{} {} {:?}", request.method(), uri, request.version());

        let token = request
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            addr,
            request: request_line,
            token,
        }
    }

    fn into_event(self, user_id: String, capture: &StatusCapture) -> RequestEvent {
        RequestEvent {
            addr: self.addr,
            user_id,
            timestamp: Local::now(),
            request: self.request,
            status: capture.status(),
            size: capture.bytes(),
        }
    }
}

/// Emits the event if the request future is dropped before a response
/// exists.
struct AuditGuard {
    pending: Option<PendingEvent>,
    capture: StatusCapture,
    sink: AuditSink,
}

impl AuditGuard {
    fn disarm(&mut self) -> Option<PendingEvent> {
        self.pending.take()
    }
}

impl Drop for AuditGuard {
    fn drop(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let sink = self.sink.clone();
        let capture = self.capture.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let user_id = sink.resolve_identity(pending.token.as_deref()).await;
                    sink.emit(pending.into_event(user_id, &capture));
                });
            }
            Err(_) => sink.emit(pending.into_event(UNKNOWN.to_string(), &capture)),
        }
    }
}

/// Layer that records a [`RequestEvent`] for every request.
#[derive(Clone)]
pub struct AuditLayer {
    sink: AuditSink,
}

impl AuditLayer {
    pub fn new(sink: AuditSink) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            sink: self.sink.clone(),
        }
    }
}

/// Middleware service produced by [`AuditLayer`].
#[derive(Clone)]
pub struct AuditService<S> {
    inner: S,
    sink: AuditSink,
}

impl<S> Service<Request> for AuditService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let capture = StatusCapture::new();
        let mut guard = AuditGuard {
            pending: Some(PendingEvent::from_request(&request)),
            capture: capture.clone(),
            sink: self.sink.clone(),
        };

        // Use the service that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = match AssertUnwindSafe(inner.call(request)).catch_unwind().await {
                Ok(result) => result?,
                Err(_) => ApiError::unclassified("request handler panicked").into_response(),
            };

            let token = guard.pending.as_ref().and_then(|p| p.token.clone());
            let user_id = guard.sink.resolve_identity(token.as_deref()).await;

            let Some(pending) = guard.disarm() else {
                return Ok(response);
            };

            let sink = guard.sink.clone();
            let observed = capture.clone();
            Ok(capture.observe(response, move || {
                sink.emit(pending.into_event(user_id, &observed));
            }))
        })
    }
}

/// Runs the single consumer of the event conduit, writing each event as a
/// log line until every producer is gone.
pub fn spawn_request_logger(mut requests: broadcast::Receiver<RequestEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match requests.recv().await {
                Ok(event) => info!(target: "gort::requests", "{}", event),
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    warn!(dropped, "Request log consumer fell behind; oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
