// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capturing the OAuth redirect after the user approves access.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{OriginalUri, Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::TokenError;

/// Default time to wait for the browser redirect.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);
const MIN_PROGRESS_INTERVAL: Duration = Duration::from_millis(10);

const SUCCESS_PAGE: &str = "<html><body><h1>Authentication successful</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Authentication failed</h1>\
<p>The provider did not grant access. Check the terminal for details.</p></body></html>";

/// Phase-one output of the interactive flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// URL the user must open to grant access.
    pub url: String,
    /// CSRF state embedded in `url`.
    pub state: String,
}

/// Obtains the redirected URL (or a bare code) for an authorization request.
#[async_trait]
pub trait RedirectReceiver: Send + Sync {
    async fn receive(&self, request: &AuthorizationRequest) -> Result<String, TokenError>;
}

/// One-shot HTTP listener on the redirect URI's port.
#[derive(Debug, Clone)]
pub struct LocalCallbackServer {
    addr: SocketAddr,
    timeout: Duration,
    progress_interval: Duration,
}

impl LocalCallbackServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, timeout: DEFAULT_CALLBACK_TIMEOUT, progress_interval: PROGRESS_INTERVAL }
    }

    /// Listen on loopback at the port of `redirect_uri`.
    pub fn for_redirect_uri(redirect_uri: &str) -> Result<Self, TokenError> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| TokenError::Config(format!("invalid redirect URI {redirect_uri:?}: {e}")))?;
        let port = url.port_or_known_default().ok_or_else(|| {
            TokenError::Config(format!("redirect URI {redirect_uri:?} has no port"))
        })?;
        Ok(Self::new(SocketAddr::from((Ipv4Addr::LOCALHOST, port))))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How often to log that the redirect is still pending (at least 10ms).
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(MIN_PROGRESS_INTERVAL);
        self
    }

    /// Bind the listener without waiting yet.
    pub async fn listen(&self) -> Result<CallbackListener, TokenError> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            TokenError::Config(format!("cannot listen for OAuth redirect on {}: {e}", self.addr))
        })?;
        let addr = listener.local_addr().map_err(|e| TokenError::Config(e.to_string()))?;
        Ok(CallbackListener {
            listener,
            addr,
            timeout: self.timeout,
            progress_interval: self.progress_interval,
        })
    }
}

#[async_trait]
impl RedirectReceiver for LocalCallbackServer {
    async fn receive(&self, request: &AuthorizationRequest) -> Result<String, TokenError> {
        let listener = self.listen().await?;
        tracing::info!(addr = %listener.local_addr(), "waiting for OAuth redirect");
        tracing::debug!(state = %request.state, "pending authorization");
        listener.wait().await
    }
}

/// A bound callback listener. [`wait`](Self::wait) serves until the
/// redirect arrives or the timeout elapses.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    addr: SocketAddr,
    timeout: Duration,
    progress_interval: Duration,
}

impl CallbackListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn wait(self) -> Result<String, TokenError> {
        let Self { listener, addr, timeout, progress_interval } = self;
        let (tx, mut rx) = oneshot::channel();
        let app = router(addr, tx);
        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
        });

        let deadline = tokio::time::Instant::now() + timeout;
        let mut progress = tokio::time::interval(progress_interval);
        progress.tick().await;

        let outcome = loop {
            tokio::select! {
                captured = &mut rx => {
                    break captured.map_err(|_| {
                        TokenError::authentication("oauth", "callback server stopped unexpectedly")
                    });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    break Err(TokenError::authentication(
                        "oauth",
                        "timed out waiting for authorization",
                    ));
                }
                _ = progress.tick() => {
                    let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
                    tracing::info!(
                        remaining_secs = remaining.as_secs(),
                        "still waiting for OAuth redirect"
                    );
                }
            }
        };

        shutdown.cancel();
        if let Err(e) = server.await {
            tracing::debug!(err = %e, "callback server task ended abnormally");
        }
        outcome
    }
}

type Capture = Arc<Mutex<Option<oneshot::Sender<String>>>>;

#[derive(Clone)]
struct CallbackState {
    addr: SocketAddr,
    capture: Capture,
}

/// Router answering every path: the first request carrying `code` or
/// `error` is captured; anything else (favicon, health checks) gets 404.
pub(crate) fn router(addr: SocketAddr, tx: oneshot::Sender<String>) -> Router {
    let state = CallbackState { addr, capture: Arc::new(Mutex::new(Some(tx))) };
    Router::new().fallback(handle_redirect).with_state(state)
}

async fn handle_redirect(
    State(state): State<CallbackState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Html<&'static str>) {
    let failed = params.contains_key("error");
    if !failed && !params.contains_key("code") {
        return (StatusCode::NOT_FOUND, Html("waiting for authorization"));
    }

    let sender = state.capture.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(tx) = sender {
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let _ = tx.send(format!("http://{}{}", state.addr, path));
    }

    if failed {
        (StatusCode::OK, Html(FAILURE_PAGE))
    } else {
        (StatusCode::OK, Html(SUCCESS_PAGE))
    }
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
