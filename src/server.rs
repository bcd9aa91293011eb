//! Pipeline composer and HTTP server.
//!
//! Stages run in a fixed order around the route table:
//!
//! ```text
//! [CORS] → Trace → Audit (+ status observer) → Session token gate → routes
//! ```
//!
//! The audit stage sits outside the gate so rejected requests are recorded
//! too, and the error mapper runs inside each handler's `IntoResponse`, so
//! the observer always sees the final status.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::AppConfig;
use crate::dataaccess::{await_initialized, DalResult, SharedDataAccess};
use crate::handlers::{protected, public};
use crate::middleware::{session_token_middleware, AuditLayer, AuditSink, RequestEvent, TokenGate};
use crate::state::AppState;

/// Builder for the middleware stack wrapped around a route table.
pub struct Pipeline {
    state: AppState,
    gate: TokenGate,
    audit: AuditSink,
    enable_cors: bool,
}

impl Pipeline {
    pub fn new(state: AppState, config: &AppConfig, events: broadcast::Sender<RequestEvent>) -> Self {
        let gate = TokenGate::new(state.dal.clone(), config.security.exempt_paths.iter().cloned());
        let audit = AuditSink::new(state.dal.clone(), events);

        Self {
            state,
            gate,
            audit,
            enable_cors: config.security.enable_cors,
        }
    }

    /// Wraps `routes` in the stages and binds the shared state.
    pub fn compose(self, routes: Router<AppState>) -> Router {
        let stages = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(AuditLayer::new(self.audit))
            .layer(middleware::from_fn_with_state(self.gate, session_token_middleware));

        let router = routes.layer(stages).with_state(self.state);

        if self.enable_cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }
}

/// The `/v2` route table.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Public (exempt from the token gate)
        .route("/v2/authenticate", post(public::authenticate_post))
        .route("/v2/bootstrap", post(public::bootstrap_post))
        .route("/v2/healthz", get(public::healthz_get))
        .route("/v2/metrics", get(public::metrics_get))
        // Groups
        .route("/v2/groups", get(protected::groups_get))
        .route(
            "/v2/groups/:group",
            get(protected::group_get)
                .put(protected::group_put)
                .delete(protected::group_delete),
        )
        .route(
            "/v2/groups/:group/members/:username",
            put(protected::group_member_put).delete(protected::group_member_delete),
        )
        .route(
            "/v2/groups/:group/roles/:role",
            put(protected::group_role_put).delete(protected::group_role_delete),
        )
        // Roles
        .route("/v2/roles", get(protected::roles_get))
        .route(
            "/v2/roles/:role",
            get(protected::role_get)
                .put(protected::role_put)
                .delete(protected::role_delete),
        )
        .route(
            "/v2/roles/:role/bundles/:bundle/permissions/:permission",
            put(protected::role_permission_put).delete(protected::role_permission_delete),
        )
        // Users
        .route("/v2/users", get(protected::users_get))
        .route(
            "/v2/users/:username",
            get(protected::user_get)
                .put(protected::user_put)
                .delete(protected::user_delete),
        )
}

/// The assembled REST service, ready to bind.
pub struct RestServer {
    addr: String,
    router: Router,
    events: broadcast::Sender<RequestEvent>,
}

impl RestServer {
    /// Waits for the data access layer to come up, then composes the
    /// pipeline around [`routes`].
    pub async fn build(dal: SharedDataAccess, config: &AppConfig, metrics: PrometheusHandle) -> DalResult<Self> {
        await_initialized(dal.as_ref(), config.dal_init_timeout()).await?;

        let (events, _) = broadcast::channel(config.server.audit_queue_capacity);
        let state = AppState::new(dal, metrics);
        let router = Pipeline::new(state, config, events.clone()).compose(routes());

        Ok(Self {
            addr: config.server.bind_addr.clone(),
            router,
            events,
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Subscribes to the request event conduit. Only events emitted after
    /// the call are received.
    pub fn requests(&self) -> broadcast::Receiver<RequestEvent> {
        self.events.subscribe()
    }

    pub async fn listen_and_serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr.as_str())
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!("Gort API listening on http://{}", local_addr);

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

        info!("Gort API stopped");
        Ok(())
    }
}
