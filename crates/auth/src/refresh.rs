// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-endpoint retries for refresh and code-exchange grants.

use std::future::Future;
use std::time::Duration;

use crate::oauth::{refresh_grant, GrantError, TokenResponse};
use crate::provider::ProviderConfig;

/// Bounded exponential backoff for transient token-endpoint failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts count from 1).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Refresh with exponential backoff retries.
pub async fn refresh_with_retries(
    client: &reqwest::Client,
    provider: &ProviderConfig,
    refresh_token: &str,
    policy: &RetryPolicy,
) -> Result<TokenResponse, GrantError> {
    with_retries(&provider.name, "refresh", policy, || {
        refresh_grant(client, provider, refresh_token)
    })
    .await
}

/// Run a token-endpoint grant with exponential backoff retries.
///
/// A rejection stops immediately. When every attempt fails transiently the
/// last transient error is returned.
pub async fn with_retries<F, Fut>(
    provider: &str,
    grant: &str,
    policy: &RetryPolicy,
    mut attempt_grant: F,
) -> Result<TokenResponse, GrantError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TokenResponse, GrantError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = GrantError::Transient(format!("no {grant} attempt made"));

    for attempt in 1..=max_attempts {
        match attempt_grant().await {
            Ok(token) => return Ok(token),
            Err(GrantError::Rejected(msg)) => return Err(GrantError::Rejected(msg)),
            Err(GrantError::Transient(msg)) => {
                tracing::warn!(
                    provider,
                    grant,
                    attempt,
                    max = max_attempts,
                    error = %msg,
                    "token request failed, retrying"
                );
                last = GrantError::Transient(msg);
                if attempt < max_attempts {
                    tokio::time::sleep(policy.backoff_for(attempt)).await;
                }
            }
        }
    }

    Err(last)
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
