// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted OAuth2 credential and its expiry policy.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::oauth::TokenResponse;

/// Margin before `expires_at` at which a token is already treated as expired.
pub const DEFAULT_EXPIRY_MARGIN_SECS: u64 = 60;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// An OAuth2 bearer credential for one provider.
///
/// The refresh token stays inside this crate: there is no public getter, no
/// public serde impl, and `Debug` redacts both tokens.
#[derive(Clone, PartialEq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    /// Expiry as epoch seconds.
    expires_at: u64,
    scope: BTreeSet<String>,
    provider_metadata: serde_json::Map<String, serde_json::Value>,
}

/// On-disk and secret-store document for a [`Credential`].
#[derive(Serialize, Deserialize)]
struct PersistedCredential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_at: u64,
    #[serde(default)]
    scope: BTreeSet<String>,
    #[serde(default)]
    provider_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Logical state of a provider's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Absent,
    Valid,
    Expired,
}

/// Read-only summary handed to callers that must not see tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialStatus {
    pub provider: String,
    pub state: CredentialState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    pub has_refresh_token: bool,
}

impl Credential {
    /// Build a credential from an authorization-code exchange.
    ///
    /// `requested_scopes` stands in for the granted scope when the provider
    /// does not echo one back.
    pub fn from_authorization(token: TokenResponse, requested_scopes: &[String], now: u64) -> Self {
        let scope = match token.scope.as_deref() {
            Some(s) => parse_scope(s),
            None => requested_scopes.iter().cloned().collect(),
        };
        Self {
            expires_at: expiry_from(token.expires_in, now),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            scope,
            provider_metadata: token.extra,
        }
    }

    /// Produce the successor of this credential from a refresh response.
    ///
    /// A refresh token in the response replaces the stored one; otherwise the
    /// prior refresh token is retained.
    pub fn refreshed(&self, token: TokenResponse, now: u64) -> Self {
        let mut provider_metadata = self.provider_metadata.clone();
        provider_metadata.extend(token.extra);
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or_else(|| self.refresh_token.clone()),
            expires_at: expiry_from(token.expires_in, now),
            scope: token.scope.as_deref().map(parse_scope).unwrap_or_else(|| self.scope.clone()),
            provider_metadata,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn scope(&self) -> &BTreeSet<String> {
        &self.scope
    }

    pub fn provider_metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.provider_metadata
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub(crate) fn set_expires_at(&mut self, expires_at: u64) {
        self.expires_at = expires_at;
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&PersistedCredential {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            scope: self.scope.clone(),
            provider_metadata: self.provider_metadata.clone(),
        })
    }

    pub(crate) fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let doc: PersistedCredential = serde_json::from_slice(bytes)?;
        Ok(Self {
            access_token: doc.access_token,
            refresh_token: doc.refresh_token,
            expires_at: doc.expires_at,
            scope: doc.scope,
            provider_metadata: doc.provider_metadata,
        })
    }

    /// True when fewer than `margin_secs` of validity remain at `now`.
    pub fn is_expired(&self, now: u64, margin_secs: u64) -> bool {
        now.saturating_add(margin_secs) >= self.expires_at
    }

    pub fn state(&self, now: u64, margin_secs: u64) -> CredentialState {
        if self.is_expired(now, margin_secs) {
            CredentialState::Expired
        } else {
            CredentialState::Valid
        }
    }

    pub fn status(&self, provider: &str, now: u64, margin_secs: u64) -> CredentialStatus {
        CredentialStatus {
            provider: provider.to_owned(),
            state: self.state(now, margin_secs),
            expires_in_secs: self.expires_at.checked_sub(now),
            scope: self.scope.iter().cloned().collect(),
            has_refresh_token: self.has_refresh_token(),
        }
    }
}

impl CredentialStatus {
    pub fn absent(provider: &str) -> Self {
        Self {
            provider: provider.to_owned(),
            state: CredentialState::Absent,
            expires_in_secs: None,
            scope: vec![],
            has_refresh_token: false,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("provider_metadata", &self.provider_metadata)
            .finish()
    }
}

/// Split an OAuth `scope` string (space-delimited) into a set.
pub fn parse_scope(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(str::to_owned).collect()
}

fn expiry_from(expires_in: Option<u64>, now: u64) -> u64 {
    now.saturating_add(expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS))
}

/// Current wall-clock time as epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
