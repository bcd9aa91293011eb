#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use gort_api_rust::auth::SESSION_TOKEN_HEADER;
use gort_api_rust::config::AppConfig;
use gort_api_rust::dataaccess::MemoryDataAccess;
use gort_api_rust::middleware::RequestEvent;
use gort_api_rust::server::RestServer;
use gort_api_rust::telemetry;

/// A server on its own port with its own in-memory store.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub events: broadcast::Receiver<RequestEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let mut config = AppConfig::development();
        config.server.bind_addr = format!("127.0.0.1:{}", port);

        let server = RestServer::build(
            Arc::new(MemoryDataAccess::new()),
            &config,
            telemetry::detached_handle(),
        )
        .await?;
        let events = server.requests();

        let listener = TcpListener::bind(&config.server.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            events,
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bootstraps the service and exchanges the admin credentials for a
    /// session token.
    pub async fn admin_token(&self) -> Result<String> {
        let res = self
            .client
            .post(self.url("/v2/bootstrap"))
            .json(&json!({}))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "bootstrap failed: {}", res.status());
        let admin: Value = res.json().await?;

        let res = self
            .client
            .post(self.url("/v2/authenticate"))
            .json(&json!({ "username": admin["username"], "password": admin["password"] }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "authenticate failed: {}", res.status());
        let token: Value = res.json().await?;

        token["token"]
            .as_str()
            .map(str::to_string)
            .context("token payload has no token")
    }

    pub fn authed(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(SESSION_TOKEN_HEADER, token)
    }

    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await?
    }
}
