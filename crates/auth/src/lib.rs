// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 credential lifecycle for the Fitbit and Google Sheets sync jobs.

pub mod callback;
pub mod credential;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod refresh;
pub mod store;
pub mod test_support;

use std::sync::Once;
use std::time::Duration;

pub use callback::{AuthorizationRequest, LocalCallbackServer, RedirectReceiver};
pub use credential::{Credential, CredentialState, CredentialStatus};
pub use error::{ErrorCode, TokenError};
pub use manager::TokenManager;
pub use provider::ProviderConfig;
pub use refresh::RetryPolicy;
pub use store::{CredentialStore, FileStore, SecretCredentialStore, VaultKvStore};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
pub fn ensure_crypto_provider() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// HTTP client shared by the token endpoint and secret-store calls.
pub fn http_client() -> reqwest::Client {
    ensure_crypto_provider();
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("vitalsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
