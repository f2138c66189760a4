// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle for one provider: load, validate, refresh, persist.
//!
//! [`TokenManager::get_valid_token`] is the only call a scheduled job needs.
//! It never enters the interactive flow; when no usable credential exists it
//! fails with [`TokenError::Authentication`] and an operator has to run the
//! two-phase authorization ([`begin_authorization`] then
//! [`complete_authorization`]) once.
//!
//! [`begin_authorization`]: TokenManager::begin_authorization
//! [`complete_authorization`]: TokenManager::complete_authorization

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Mutex;

use crate::callback::{AuthorizationRequest, RedirectReceiver};
use crate::credential::{
    epoch_secs, Credential, CredentialStatus, DEFAULT_EXPIRY_MARGIN_SECS,
};
use crate::error::TokenError;
use crate::oauth::{self, GrantError};
use crate::pkce;
use crate::provider::ProviderConfig;
use crate::refresh::{refresh_with_retries, with_retries, RetryPolicy};
use crate::store::{CredentialStore, StoredCredential};

/// In-flight authorization code flow, keyed by its `state` parameter.
struct PendingAuthorization {
    code_verifier: Option<String>,
}

#[derive(Default)]
struct Inner {
    /// `None` until the store has been read once.
    cached: Option<Option<StoredCredential>>,
    pending: HashMap<String, PendingAuthorization>,
}

/// Owns the credential for a single provider.
///
/// All operations lock the same async mutex, so one instance never has more
/// than one refresh in flight.
pub struct TokenManager {
    provider: ProviderConfig,
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    retry: RetryPolicy,
    margin_secs: u64,
    inner: Mutex<Inner>,
}

impl TokenManager {
    pub fn new(provider: ProviderConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            provider,
            store,
            http: crate::http_client(),
            retry: RetryPolicy::default(),
            margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seconds before `expires_at` at which a token is treated as expired.
    pub fn with_margin(mut self, margin_secs: u64) -> Self {
        self.margin_secs = margin_secs;
        self
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Return an access token that is valid for at least the margin.
    ///
    /// A cached, still-valid credential is returned without any I/O.
    /// Otherwise exactly one refresh is performed and persisted before the
    /// new token is returned.
    pub async fn get_valid_token(&self) -> Result<String, TokenError> {
        let mut inner = self.inner.lock().await;
        let current = self.cached(&mut inner).await?;

        match current {
            None => Err(self.auth_error(
                "no stored credential; interactive authorization is required",
            )),
            Some(stored) if !stored.credential.is_expired(epoch_secs(), self.margin_secs) => {
                Ok(stored.credential.access_token().to_owned())
            }
            Some(_) => {
                let credential = self.refresh_locked(&mut inner, false).await?;
                Ok(credential.access_token().to_owned())
            }
        }
    }

    /// Force a refresh-token grant regardless of remaining validity.
    pub async fn refresh(&self) -> Result<Credential, TokenError> {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner, true).await
    }

    /// Read the store, replacing the cached credential.
    pub async fn load_persisted(&self) -> Result<Option<Credential>, TokenError> {
        let mut inner = self.inner.lock().await;
        let loaded = self.store.load().await?;
        let credential = loaded.as_ref().map(|s| s.credential.clone());
        inner.cached = Some(loaded);
        Ok(credential)
    }

    /// Summarize the persisted credential without refreshing it.
    pub async fn status(&self) -> Result<CredentialStatus, TokenError> {
        let _inner = self.inner.lock().await;
        let status = match self.store.load().await? {
            Some(stored) => {
                stored.credential.status(&self.provider.name, epoch_secs(), self.margin_secs)
            }
            None => CredentialStatus::absent(&self.provider.name),
        };
        Ok(status)
    }

    /// Phase one of the interactive flow: mint PKCE and CSRF state and return
    /// the URL the user must visit.
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest, TokenError> {
        self.provider.validate()?;

        let code_verifier = self.provider.use_pkce.then(pkce::generate_code_verifier);
        let code_challenge = code_verifier.as_deref().map(pkce::compute_code_challenge);
        let state = pkce::generate_state();
        let url = pkce::build_auth_url(&self.provider, &state, code_challenge.as_deref())?;

        self.inner
            .lock()
            .await
            .pending
            .insert(state.clone(), PendingAuthorization { code_verifier });
        tracing::debug!(provider = %self.provider.name, "authorization started");
        Ok(AuthorizationRequest { url, state })
    }

    /// Phase two: accept the redirected URL (or a bare code), exchange the
    /// code, persist and cache the new credential.
    pub async fn complete_authorization(
        &self,
        redirect_url_or_code: &str,
    ) -> Result<Credential, TokenError> {
        let mut inner = self.inner.lock().await;
        let redirect = parse_redirect(redirect_url_or_code);

        if let Some(error) = redirect.error {
            if let Some(state) = &redirect.state {
                inner.pending.remove(state);
            }
            let detail = match redirect.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            return Err(self.auth_error(format!("authorization denied: {detail}")));
        }

        let code = redirect
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| self.auth_error("redirect carries no authorization code"))?;

        let pending = match &redirect.state {
            Some(state) => inner
                .pending
                .remove(state)
                .ok_or_else(|| self.auth_error("state mismatch: unknown or expired authorization"))?,
            None => self.take_sole_pending(&mut inner)?,
        };

        let verifier = pending.code_verifier.as_deref();
        let token = with_retries(&self.provider.name, "authorization_code", &self.retry, || {
            oauth::exchange_code(&self.http, &self.provider, &code, verifier)
        })
        .await
        .map_err(|e| self.auth_error(format!("code exchange failed: {e}")))?;

        let credential = Credential::from_authorization(token, &self.provider.scopes, epoch_secs());
        let revision = self.store.save(&credential, None).await?;
        inner.cached =
            Some(Some(StoredCredential { credential: credential.clone(), revision }));

        tracing::info!(
            provider = %self.provider.name,
            location = %self.store.location(),
            "authorization completed, credential stored"
        );
        Ok(credential)
    }

    /// Run both phases, letting `receiver` capture the redirect.
    pub async fn authorize_interactively(
        &self,
        receiver: &dyn RedirectReceiver,
    ) -> Result<Credential, TokenError> {
        let request = self.begin_authorization().await?;
        let redirect = match receiver.receive(&request).await {
            Ok(redirect) => redirect,
            Err(e) => {
                self.inner.lock().await.pending.remove(&request.state);
                return Err(match e {
                    TokenError::Authentication { reason, .. } => self.auth_error(reason),
                    other => other,
                });
            }
        };
        self.complete_authorization(&redirect).await
    }

    async fn cached(&self, inner: &mut Inner) -> Result<Option<StoredCredential>, TokenError> {
        if let Some(cached) = &inner.cached {
            return Ok(cached.clone());
        }
        let loaded = self.store.load().await?;
        inner.cached = Some(loaded.clone());
        Ok(loaded)
    }

    async fn refresh_locked(&self, inner: &mut Inner, force: bool) -> Result<Credential, TokenError> {
        // Another process may have refreshed (and rotated the refresh token)
        // since the cache was filled.
        let latest = self.store.load().await?;
        inner.cached = Some(latest.clone());
        let Some(current) = latest else {
            return Err(self.auth_error(
                "no stored credential; interactive authorization is required",
            ));
        };

        if !force && !current.credential.is_expired(epoch_secs(), self.margin_secs) {
            tracing::info!(provider = %self.provider.name, "adopted credential refreshed elsewhere");
            return Ok(current.credential);
        }

        let refresh_token = current
            .credential
            .refresh_token()
            .ok_or_else(|| self.auth_error("credential has no refresh token"))?;

        let token = refresh_with_retries(&self.http, &self.provider, refresh_token, &self.retry)
            .await
            .map_err(|e| match e {
                GrantError::Rejected(msg) => {
                    tracing::warn!(provider = %self.provider.name, err = %msg, "refresh rejected");
                    self.auth_error(format!("refresh rejected: {msg}"))
                }
                GrantError::Transient(msg) => self.auth_error(format!(
                    "token endpoint unavailable after {} attempts: {msg}",
                    self.retry.max_attempts.max(1)
                )),
            })?;

        let refreshed = current.credential.refreshed(token, epoch_secs());
        let revision = self.store.save(&refreshed, Some(&current.revision)).await?;
        inner.cached = Some(Some(StoredCredential { credential: refreshed.clone(), revision }));

        tracing::info!(
            provider = %self.provider.name,
            expires_at = refreshed.expires_at(),
            "credential refreshed"
        );
        Ok(refreshed)
    }

    fn take_sole_pending(&self, inner: &mut Inner) -> Result<PendingAuthorization, TokenError> {
        match inner.pending.len() {
            0 => Err(self.auth_error("no authorization in progress")),
            1 => {
                let state = inner.pending.keys().next().cloned().unwrap_or_default();
                inner
                    .pending
                    .remove(&state)
                    .ok_or_else(|| self.auth_error("no authorization in progress"))
            }
            _ => Err(self.auth_error(
                "several authorizations are pending; paste the full redirect URL",
            )),
        }
    }

    fn auth_error(&self, reason: impl std::fmt::Display) -> TokenError {
        TokenError::authentication(&self.provider.name, reason)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("provider", &self.provider.name)
            .field("store", &self.store.location())
            .field("margin_secs", &self.margin_secs)
            .finish()
    }
}

/// Parameters recovered from user input after the redirect.
#[derive(Debug, Default, PartialEq, Eq)]
struct Redirect {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Accept a full redirect URL, a bare query string, or a bare code.
fn parse_redirect(input: &str) -> Redirect {
    let input = input.trim();
    let query = match Url::parse(input) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Some(url.query().unwrap_or_default().to_owned())
        }
        _ => match input.split_once('?') {
            Some((_, query)) => Some(query.to_owned()),
            None if input.contains("code=") || input.contains("error=") => Some(input.to_owned()),
            None => None,
        },
    };

    let Some(query) = query else {
        return Redirect { code: Some(input.to_owned()), ..Redirect::default() };
    };

    let mut redirect = Redirect::default();
    let parsed = Url::parse(&format!("http://localhost/?{query}"));
    for (key, value) in parsed.iter().flat_map(|u| u.query_pairs()) {
        let slot = match key.as_ref() {
            "code" => &mut redirect.code,
            "state" => &mut redirect.state,
            "error" => &mut redirect.error,
            "error_description" => &mut redirect.error_description,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }
    redirect
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
