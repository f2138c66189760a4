// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: a scripted OAuth token endpoint.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::credential::{epoch_secs, Credential};
use crate::oauth::TokenResponse;

/// One request observed by [`StubTokenServer`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub form: HashMap<String, String>,
    pub authorization: Option<String>,
}

/// Token endpoint on an ephemeral port that replays scripted responses in
/// order, repeating the last one once the script runs out.
pub struct StubTokenServer {
    addr: SocketAddr,
    calls: Arc<AtomicU32>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    shutdown: CancellationToken,
}

impl StubTokenServer {
    pub async fn start(responses: Vec<(u16, serde_json::Value)>) -> anyhow::Result<Self> {
        let calls = Arc::new(AtomicU32::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responses = Arc::new(responses);

        let handler_calls = Arc::clone(&calls);
        let handler_requests = Arc::clone(&requests);
        let app = Router::new().route(
            "/token",
            post(move |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| {
                let calls = Arc::clone(&handler_calls);
                let requests = Arc::clone(&handler_requests);
                let resps = Arc::clone(&responses);
                async move {
                    let authorization = headers
                        .get(axum::http::header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    requests
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(RecordedRequest { form, authorization });

                    let idx = calls.fetch_add(1, Ordering::SeqCst) as usize;
                    let (status, body) = resps
                        .get(idx)
                        .or_else(|| resps.last())
                        .cloned()
                        .unwrap_or((500, serde_json::json!({})));
                    (
                        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        body.to_string(),
                    )
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
                .ok();
        });

        Ok(Self { addr, calls, requests, shutdown })
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for StubTokenServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Credential with the given tokens expiring at `expires_at` (epoch seconds).
pub fn credential(access_token: &str, refresh_token: Option<&str>, expires_at: u64) -> Credential {
    let now = epoch_secs();
    let token = TokenResponse {
        access_token: access_token.to_owned(),
        refresh_token: refresh_token.map(str::to_owned),
        expires_in: Some(expires_at.saturating_sub(now)),
        scope: Some("sleep heartrate".to_owned()),
        extra: serde_json::Map::new(),
    };
    let mut cred = Credential::from_authorization(token, &[], now);
    cred.set_expires_at(expires_at);
    cred
}

/// Assert that an expression is `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
