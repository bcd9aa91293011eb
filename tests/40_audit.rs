mod common;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;

#[tokio::test]
async fn every_request_is_audited() -> Result<()> {
    const REQUESTS: usize = 16;

    let mut server = common::TestServer::spawn().await?;

    let mut statuses = Vec::new();
    let requests = (0..REQUESTS).map(|i| {
        let path = if i % 2 == 0 { "/v2/healthz" } else { "/v2/roles" };
        server.client.get(server.url(path)).send()
    });
    for res in futures::future::join_all(requests).await {
        let res = res?;
        statuses.push(res.status().as_u16());
        res.bytes().await?;
    }

    let mut recorded = Vec::new();
    for _ in 0..REQUESTS {
        let event = tokio::time::timeout(Duration::from_secs(5), server.events.recv())
            .await
            .context("request event not emitted")??;
        assert!(event.addr.starts_with("127.0.0.1:"), "unexpected addr {}", event.addr);
        assert_eq!(event.user_id, "-");
        assert!(event.request.ends_with("HTTP/1.1"), "unexpected request line {}", event.request);
        recorded.push(event.status);
    }

    statuses.sort_unstable();
    recorded.sort_unstable();
    assert_eq!(statuses, recorded);
    assert_eq!(recorded.iter().filter(|s| **s == StatusCode::UNAUTHORIZED.as_u16()).count(), REQUESTS / 2);

    server.stop().await
}
