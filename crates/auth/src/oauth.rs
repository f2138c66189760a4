// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 token-endpoint wire types and grant requests.

use serde::{Deserialize, Serialize};

use crate::provider::{ClientAuth, ProviderConfig};

/// Standard OAuth2 token response. Unknown fields land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// RFC 6749 error body.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Fitbit's error envelope: `{"errors": [{"errorType": ..., "message": ...}]}`.
#[derive(Debug, Deserialize)]
struct FitbitErrorResponse {
    errors: Vec<FitbitError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitError {
    error_type: String,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a failed grant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    /// The provider refused the grant (`invalid_grant`, `invalid_client`, ...).
    /// Retrying will not help.
    Rejected(String),
    /// Network failure, 5xx or 429. Retry with backoff.
    Transient(String),
}

impl std::fmt::Display for GrantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "rejected: {msg}"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
        }
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    code: &str,
    code_verifier: Option<&str>,
) -> Result<TokenResponse, GrantError> {
    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", provider.redirect_uri.as_str()),
    ];
    if let Some(verifier) = code_verifier {
        params.push(("code_verifier", verifier));
    }
    post_token(client, provider, params).await
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_grant(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    refresh_token: &str,
) -> Result<TokenResponse, GrantError> {
    let params = vec![("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
    post_token(client, provider, params).await
}

async fn post_token(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    mut params: Vec<(&str, &str)>,
) -> Result<TokenResponse, GrantError> {
    params.push(("client_id", provider.client_id.as_str()));

    let mut req = client.post(&provider.token_url);
    match provider.client_auth {
        ClientAuth::Basic => {
            req = req.basic_auth(&provider.client_id, provider.client_secret.as_deref());
        }
        ClientAuth::RequestBody => {
            if let Some(ref secret) = provider.client_secret {
                params.push(("client_secret", secret.as_str()));
            }
        }
    }

    let resp = req
        .form(&params)
        .send()
        .await
        .map_err(|e| GrantError::Transient(format!("HTTP error: {e}")))?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| GrantError::Transient(format!("read body: {e}")))?;

    if !status.is_success() {
        return Err(classify_failure(status, &body));
    }

    serde_json::from_str::<TokenResponse>(&body)
        .map_err(|e| GrantError::Rejected(format!("unparsable token response: {e}")))
}

/// Decide whether a non-success token-endpoint response is worth retrying.
pub(crate) fn classify_failure(status: reqwest::StatusCode, body: &str) -> GrantError {
    let detail = error_detail(body).unwrap_or_else(|| format!("HTTP {status}: {body}"));
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        GrantError::Transient(detail)
    } else {
        GrantError::Rejected(detail)
    }
}

fn error_detail(body: &str) -> Option<String> {
    if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(body) {
        return Some(match err.error_description {
            Some(desc) if !desc.is_empty() => format!("{}: {desc}", err.error),
            _ => err.error,
        });
    }
    let fitbit = serde_json::from_str::<FitbitErrorResponse>(body).ok()?;
    let first = fitbit.errors.into_iter().next()?;
    Some(match first.message {
        Some(msg) => format!("{}: {msg}", first.error_type),
        None => first.error_type,
    })
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
