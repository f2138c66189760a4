// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth authorization code + PKCE (RFC 7636) helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::TokenError;
use crate::provider::ProviderConfig;

/// Generate a PKCE code verifier (43-128 char URL-safe random string).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random CSRF state parameter (32 bytes, 43 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL for `provider`.
///
/// Parameter order: response_type, client_id, redirect_uri, scope, state,
/// then the PKCE pair when a challenge is given, then provider extras.
/// Spaces are form-encoded as `+`.
pub fn build_auth_url(
    provider: &ProviderConfig,
    state: &str,
    code_challenge: Option<&str>,
) -> Result<String, TokenError> {
    let mut url = Url::parse(&provider.authorize_url).map_err(|e| {
        TokenError::Config(format!("{}: invalid authorize_url: {e}", provider.name))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", &provider.redirect_uri)
            .append_pair("scope", &provider.scope_param())
            .append_pair("state", state);
        if let Some(challenge) = code_challenge {
            query
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", "S256");
        }
        for (key, value) in &provider.extra_authorize_params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
