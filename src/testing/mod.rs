use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;

use crate::auth::SESSION_TOKEN_HEADER;
use crate::config::AppConfig;
use crate::dataaccess::{
    DalResult, DalState, DataAccess, DataAccessError, Group, MemoryDataAccess, Role, Token, User,
};
use crate::middleware::RequestEvent;
use crate::server::{routes, Pipeline};
use crate::state::AppState;
use crate::telemetry;

/// User created by [`TestContext::session_token`].
pub const TEST_USER: &str = "tester";

/// In-memory data access with switchable faults and a token evaluation
/// counter.
#[derive(Default)]
pub struct FaultyDataAccess {
    inner: MemoryDataAccess,
    fail_user_create: AtomicBool,
    fail_user_delete: AtomicBool,
    fail_lookups: AtomicBool,
    token_evaluations: AtomicUsize,
}

impl FaultyDataAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_user_create(&self, fail: bool) {
        self.fail_user_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_user_delete(&self, fail: bool) {
        self.fail_user_delete.store(fail, Ordering::SeqCst);
    }

    /// Makes user reads (`user_exists`, `user_get`, `user_list`) fail with a
    /// storage error.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn token_evaluations(&self) -> usize {
        self.token_evaluations.load(Ordering::SeqCst)
    }

    fn injected(flag: &AtomicBool, what: &str) -> DalResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(DataAccessError::Storage(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataAccess for FaultyDataAccess {
    fn updates(&self) -> watch::Receiver<DalState> {
        self.inner.updates()
    }

    async fn user_authenticate(&self, username: &str, password: &str) -> DalResult<bool> {
        self.inner.user_authenticate(username, password).await
    }

    async fn user_create(&self, user: User) -> DalResult<()> {
        Self::injected(&self.fail_user_create, "user create")?;
        self.inner.user_create(user).await
    }

    async fn user_delete(&self, username: &str) -> DalResult<()> {
        Self::injected(&self.fail_user_delete, "user delete")?;
        self.inner.user_delete(username).await
    }

    async fn user_exists(&self, username: &str) -> DalResult<bool> {
        Self::injected(&self.fail_lookups, "lookup")?;
        self.inner.user_exists(username).await
    }

    async fn user_get(&self, username: &str) -> DalResult<User> {
        Self::injected(&self.fail_lookups, "lookup")?;
        self.inner.user_get(username).await
    }

    async fn user_list(&self) -> DalResult<Vec<User>> {
        Self::injected(&self.fail_lookups, "lookup")?;
        self.inner.user_list().await
    }

    async fn user_update(&self, user: User) -> DalResult<()> {
        self.inner.user_update(user).await
    }

    async fn group_add_user(&self, group: &str, username: &str) -> DalResult<()> {
        self.inner.group_add_user(group, username).await
    }

    async fn group_create(&self, group: Group) -> DalResult<()> {
        self.inner.group_create(group).await
    }

    async fn group_delete(&self, group: &str) -> DalResult<()> {
        self.inner.group_delete(group).await
    }

    async fn group_get(&self, group: &str) -> DalResult<Group> {
        self.inner.group_get(group).await
    }

    async fn group_grant_role(&self, group: &str, role: &str) -> DalResult<()> {
        self.inner.group_grant_role(group, role).await
    }

    async fn group_list(&self) -> DalResult<Vec<Group>> {
        self.inner.group_list().await
    }

    async fn group_remove_user(&self, group: &str, username: &str) -> DalResult<()> {
        self.inner.group_remove_user(group, username).await
    }

    async fn group_revoke_role(&self, group: &str, role: &str) -> DalResult<()> {
        self.inner.group_revoke_role(group, role).await
    }

    async fn role_create(&self, role: &str) -> DalResult<()> {
        self.inner.role_create(role).await
    }

    async fn role_delete(&self, role: &str) -> DalResult<()> {
        self.inner.role_delete(role).await
    }

    async fn role_exists(&self, role: &str) -> DalResult<bool> {
        self.inner.role_exists(role).await
    }

    async fn role_get(&self, role: &str) -> DalResult<Role> {
        self.inner.role_get(role).await
    }

    async fn role_grant_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()> {
        self.inner.role_grant_permission(role, bundle, permission).await
    }

    async fn role_list(&self) -> DalResult<Vec<Role>> {
        self.inner.role_list().await
    }

    async fn role_revoke_permission(&self, role: &str, bundle: &str, permission: &str) -> DalResult<()> {
        self.inner.role_revoke_permission(role, bundle, permission).await
    }

    async fn token_evaluate(&self, token: &str) -> bool {
        self.token_evaluations.fetch_add(1, Ordering::SeqCst);
        self.inner.token_evaluate(token).await
    }

    async fn token_generate(&self, username: &str, ttl: Duration) -> DalResult<Token> {
        self.inner.token_generate(username, ttl).await
    }

    async fn token_retrieve_by_token(&self, token: &str) -> DalResult<Token> {
        self.inner.token_retrieve_by_token(token).await
    }
}

/// Router, data access double and event conduit for one test.
pub struct TestContext {
    pub dal: Arc<FaultyDataAccess>,
    pub config: AppConfig,
    state: AppState,
    events: broadcast::Sender<RequestEvent>,
}

impl TestContext {
    pub fn new() -> Self {
        let dal = Arc::new(FaultyDataAccess::new());
        let config = AppConfig::development();
        let (events, _) = broadcast::channel(config.server.audit_queue_capacity);
        let state = AppState::new(dal.clone(), telemetry::detached_handle());

        Self {
            dal,
            config,
            state,
            events,
        }
    }

    /// The full route table behind the full middleware stack.
    pub fn app(&self) -> Router {
        self.compose(routes())
    }

    /// Arbitrary routes behind the full middleware stack.
    pub fn compose(&self, routes: Router<AppState>) -> Router {
        Pipeline::new(self.state.clone(), &self.config, self.events.clone()).compose(routes)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Receiver for request events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RequestEvent> {
        self.events.subscribe()
    }

    pub async fn create_user(&self, username: &str, password: &str) {
        let user = User {
            password: password.to_string(),
            ..User::new(username)
        };
        self.dal.user_create(user).await.unwrap();
    }

    /// Creates [`TEST_USER`] if needed and returns a valid session token.
    pub async fn session_token(&self) -> String {
        if !self.dal.user_exists(TEST_USER).await.unwrap() {
            self.create_user(TEST_USER, "password").await;
        }
        self.dal
            .token_generate(TEST_USER, Duration::from_secs(600))
            .await
            .unwrap()
            .token
    }
}

/// Drives one request through `app` and returns the status and body text.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: &str,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(SESSION_TOKEN_HEADER, token);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
