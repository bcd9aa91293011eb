mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn bootstrap_then_login() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let res = server
        .client
        .post(server.url("/v2/bootstrap"))
        .json(&json!({ "username": "someone-else", "email": "ops@example.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let admin: Value = res.json().await?;
    assert_eq!(admin["username"], "admin");
    assert_eq!(admin["email"], "ops@example.com");
    assert_eq!(admin["full_name"], "Gort Administrator");
    let password = admin["password"].as_str().unwrap_or_default().to_string();
    assert!(!password.is_empty());

    let res = server
        .client
        .post(server.url("/v2/authenticate"))
        .json(&json!({ "username": "admin", "password": password }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let token: Value = res.json().await?;
    assert_eq!(token["user"], "admin");
    assert_eq!(token["duration_secs"], 600);
    let token = token["token"].as_str().unwrap_or_default().to_string();

    let res = server.authed(reqwest::Method::GET, "/v2/users/admin", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user: Value = res.json().await?;
    assert!(user.get("password").is_none(), "password leaked: {}", user);

    server.stop().await
}

#[tokio::test]
async fn second_bootstrap_conflicts() -> Result<()> {
    let server = common::TestServer::spawn().await?;

    let first = server.client.post(server.url("/v2/bootstrap")).json(&json!({})).send().await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = server.client.post(server.url("/v2/bootstrap")).json(&json!({})).send().await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(second.text().await?, "Service already bootstrapped");

    server.stop().await
}

#[tokio::test]
async fn login_failures() -> Result<()> {
    let server = common::TestServer::spawn().await?;
    server.admin_token().await?;

    let res = server
        .client
        .post(server.url("/v2/authenticate"))
        .json(&json!({ "username": "ghost", "password": "pw" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/v2/authenticate"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .post(server.url("/v2/authenticate"))
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_ACCEPTABLE);
    assert_eq!(res.text().await?, "Corrupt JSON payload");

    server.stop().await
}
