// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wiring from CLI configuration to per-provider token managers.

use std::sync::Arc;

use vitalsync_auth::store::{CredentialStore, FileStore, SecretCredentialStore, VaultKvStore};
use vitalsync_auth::{ProviderConfig, TokenError, TokenManager};

use crate::config::{Config, ProviderName, StoreKind};

/// Whether client credentials must be present.
///
/// Read-only commands (`status`) can inspect the store without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCredentials {
    Required,
    Optional,
}

pub fn provider_config(
    config: &Config,
    provider: ProviderName,
    client: ClientCredentials,
) -> Result<ProviderConfig, TokenError> {
    let resolved = match provider {
        ProviderName::Fitbit => fitbit(config, client)?,
        ProviderName::Google => google(config, client)?,
    };
    let token_url = match provider {
        ProviderName::Fitbit => config.fitbit_token_url.as_deref(),
        ProviderName::Google => config.google_token_url.as_deref(),
    };
    Ok(match token_url {
        Some(url) => resolved.with_token_url(url),
        None => resolved,
    })
}

fn fitbit(config: &Config, client: ClientCredentials) -> Result<ProviderConfig, TokenError> {
    match (&config.fitbit_client_id, &config.fitbit_client_secret) {
        (Some(id), Some(secret)) => Ok(ProviderConfig::fitbit(id, secret)),
        _ if client == ClientCredentials::Optional => Ok(ProviderConfig::fitbit("", "")),
        _ => Err(TokenError::Config(
            "FITBIT_CLIENT_ID and FITBIT_CLIENT_SECRET must be set".to_owned(),
        )),
    }
}

fn google(config: &Config, client: ClientCredentials) -> Result<ProviderConfig, TokenError> {
    if let (Some(id), Some(secret)) = (&config.google_client_id, &config.google_client_secret) {
        return Ok(ProviderConfig::google_sheets(id, secret));
    }
    match ProviderConfig::from_google_client_secrets(&config.google_credentials_path) {
        Ok(mut provider) => {
            if let Some(id) = &config.google_client_id {
                provider.client_id.clone_from(id);
            }
            Ok(provider)
        }
        Err(_) if client == ClientCredentials::Optional => {
            Ok(ProviderConfig::google_sheets("", ""))
        }
        Err(e) => Err(e),
    }
}

pub fn credential_store(
    config: &Config,
    provider: ProviderName,
) -> Result<Arc<dyn CredentialStore>, TokenError> {
    match config.store {
        StoreKind::File => Ok(Arc::new(FileStore::new(config.token_path(provider)))),
        StoreKind::Vault => {
            let (Some(addr), Some(token)) = (&config.vault_addr, &config.vault_token) else {
                return Err(TokenError::Config("vault store needs VAULT_ADDR and VAULT_TOKEN".into()));
            };
            let backend = VaultKvStore::new(
                vitalsync_auth::http_client(),
                addr,
                token,
                &config.vault_mount,
            );
            Ok(Arc::new(SecretCredentialStore::new(
                Arc::new(backend),
                config.secret_name(provider),
            )))
        }
    }
}

pub fn manager(
    config: &Config,
    provider: ProviderName,
    client: ClientCredentials,
) -> Result<TokenManager, TokenError> {
    let provider_config = provider_config(config, provider, client)?;
    let store = credential_store(config, provider)?;
    Ok(TokenManager::new(provider_config, store))
}

#[cfg(test)]
#[path = "providers_tests.rs"]
mod tests;
