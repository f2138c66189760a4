// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vitalsync login` runs the one-time interactive authorization.
//!
//! The URL is printed to stderr. The redirect is either captured by a local
//! callback listener on the redirect URI's port, or pasted on stdin with
//! `--paste` (for headless hosts).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use vitalsync_auth::{
    AuthorizationRequest, LocalCallbackServer, RedirectReceiver, TokenError,
};

use crate::config::{Config, ProviderName};
use crate::providers::{self, ClientCredentials};

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    pub provider: ProviderName,

    /// Read the redirected URL (or code) from stdin instead of listening.
    #[arg(long)]
    pub paste: bool,

    /// How long to wait for the browser redirect.
    #[arg(long, default_value = "300")]
    pub timeout_secs: u64,
}

pub async fn run(config: &Config, args: &LoginArgs) -> Result<(), TokenError> {
    let manager = providers::manager(config, args.provider, ClientCredentials::Required)?;

    let credential = if args.paste {
        let prompt = PastePrompt::new(BufReader::new(tokio::io::stdin()));
        manager.authorize_interactively(&prompt).await?
    } else {
        let server = LocalCallbackServer::for_redirect_uri(&manager.provider().redirect_uri)?
            .with_timeout(Duration::from_secs(args.timeout_secs));
        manager.authorize_interactively(&BrowserPrompt { server }).await?
    };

    tracing::info!(
        provider = %args.provider,
        expires_at = credential.expires_at(),
        refresh_token = credential.has_refresh_token(),
        "login complete"
    );
    eprintln!("{} authorized.", args.provider);
    Ok(())
}

/// Prints the URL and waits on the local callback listener.
struct BrowserPrompt {
    server: LocalCallbackServer,
}

#[async_trait]
impl RedirectReceiver for BrowserPrompt {
    async fn receive(&self, request: &AuthorizationRequest) -> Result<String, TokenError> {
        eprintln!("Open this URL in a browser to grant access:\n\n  {}\n", request.url);
        self.server.receive(request).await
    }
}

/// Prints the URL and reads the redirected URL (or bare code) from a line of
/// input.
pub struct PastePrompt<R> {
    input: Mutex<R>,
}

impl<R> PastePrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input: Mutex::new(input) }
    }
}

#[async_trait]
impl<R> RedirectReceiver for PastePrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn receive(&self, request: &AuthorizationRequest) -> Result<String, TokenError> {
        eprintln!("Open this URL in a browser to grant access:\n\n  {}\n", request.url);
        eprintln!("Then paste the full URL you were redirected to (or just the code):");

        let mut line = String::new();
        self.input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| TokenError::authentication("oauth", format!("cannot read input: {e}")))?;

        let pasted = line.trim();
        if pasted.is_empty() {
            return Err(TokenError::authentication("oauth", "no redirect URL entered"));
        }
        Ok(pasted.to_owned())
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
