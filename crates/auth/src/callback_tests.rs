// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum_test::TestServer;

use super::*;

fn loopback_any_port() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

#[tokio::test]
async fn redirect_with_code_is_captured() -> anyhow::Result<()> {
    let (tx, rx) = oneshot::channel();
    let server = TestServer::new(router("127.0.0.1:8080".parse()?, tx))?;

    let resp = server.get("/").add_query_param("code", "abc").add_query_param("state", "s1").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Authentication successful"));
    assert_eq!(rx.await?, "http://127.0.0.1:8080/?code=abc&state=s1");
    Ok(())
}

#[tokio::test]
async fn provider_error_shows_failure_page() -> anyhow::Result<()> {
    let (tx, rx) = oneshot::channel();
    let server = TestServer::new(router("127.0.0.1:8080".parse()?, tx))?;

    let resp = server.get("/").add_query_param("error", "access_denied").await;
    resp.assert_status_ok();
    assert!(resp.text().contains("Authentication failed"));
    assert!(rx.await?.contains("error=access_denied"));
    Ok(())
}

#[tokio::test]
async fn unrelated_requests_are_ignored() -> anyhow::Result<()> {
    let (tx, mut rx) = oneshot::channel();
    let server = TestServer::new(router("127.0.0.1:8080".parse()?, tx))?;

    server.get("/favicon.ico").await.assert_status(StatusCode::NOT_FOUND);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn listener_returns_redirect_over_real_socket() -> anyhow::Result<()> {
    let listener = LocalCallbackServer::new(loopback_any_port()).listen().await?;
    let addr = listener.local_addr();
    let waiter = tokio::spawn(listener.wait());

    let body = crate::http_client()
        .get(format!("http://{addr}/callback?code=xyz&state=s2"))
        .send()
        .await?
        .text()
        .await?;
    assert!(body.contains("Authentication successful"));

    let captured = waiter.await??;
    assert_eq!(captured, format!("http://{addr}/callback?code=xyz&state=s2"));
    Ok(())
}

#[tokio::test]
async fn listener_times_out_as_authentication_error() -> anyhow::Result<()> {
    let listener = LocalCallbackServer::new(loopback_any_port())
        .with_timeout(Duration::from_millis(50))
        .with_progress_interval(Duration::from_millis(10))
        .listen()
        .await?;

    let err = listener.wait().await.err();
    assert_eq!(err.as_ref().map(|e| e.code()), Some(crate::error::ErrorCode::Authentication));
    assert!(err.map(|e| e.to_string().contains("timed out")).unwrap_or(false));
    Ok(())
}

#[yare::parameterized(
    explicit_port = { "http://localhost:8080/", 8080 },
    default_http = { "http://localhost/callback", 80 },
    custom = { "http://127.0.0.1:53682/", 53682 },
)]
fn binds_loopback_on_redirect_port(uri: &str, port: u16) {
    let server = LocalCallbackServer::for_redirect_uri(uri);
    assert_eq!(server.map(|s| s.addr).ok(), Some(SocketAddr::from((Ipv4Addr::LOCALHOST, port))));
}

#[test]
fn malformed_redirect_uri_is_config_error() {
    crate::assert_err_contains!(LocalCallbackServer::for_redirect_uri("not a url"), "invalid redirect URI");
}

#[tokio::test]
async fn zero_progress_interval_is_clamped() -> anyhow::Result<()> {
    let server = LocalCallbackServer::new(loopback_any_port())
        .with_timeout(Duration::from_millis(30))
        .with_progress_interval(Duration::ZERO);
    assert_eq!(server.progress_interval, MIN_PROGRESS_INTERVAL);

    let err = server.listen().await?.wait().await.err();
    assert_eq!(err.map(|e| e.code()), Some(crate::error::ErrorCode::Authentication));
    Ok(())
}
