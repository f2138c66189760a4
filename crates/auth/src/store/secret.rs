// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence in a versioned secret manager.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::{conflict, decode, encode, CredentialStore, Revision, StoredCredential};
use crate::credential::Credential;
use crate::error::TokenError;

/// A stored secret value and the backend's version identifier for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    pub value: String,
    pub version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SecretStoreError {
    /// The expected version no longer matches the stored one.
    #[error("version conflict")]
    Conflict,
    #[error("{0}")]
    Backend(String),
}

/// Minimal interface to a versioned secret manager.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Latest version of `name`, or `None` if it was never written.
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>, SecretStoreError>;

    /// Write a new version. With `expected_version` set the write only
    /// succeeds if that is still the latest version. Returns the new version.
    async fn put_secret(
        &self,
        name: &str,
        value: &str,
        expected_version: Option<&str>,
    ) -> Result<String, SecretStoreError>;

    /// Backend identifier used in logs and error locations.
    fn describe(&self) -> String;
}

/// [`CredentialStore`] over a named secret in any [`SecretStore`].
#[derive(Clone)]
pub struct SecretCredentialStore {
    backend: Arc<dyn SecretStore>,
    name: String,
}

impl SecretCredentialStore {
    pub fn new(backend: Arc<dyn SecretStore>, name: impl Into<String>) -> Self {
        Self { backend, name: name.into() }
    }
}

impl std::fmt::Debug for SecretCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCredentialStore").field("location", &self.location()).finish()
    }
}

#[async_trait]
impl CredentialStore for SecretCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredential>, TokenError> {
        let location = self.location();
        let secret = self
            .backend
            .get_secret(&self.name)
            .await
            .map_err(|e| TokenError::storage(&location, e))?;
        let Some(secret) = secret else {
            tracing::debug!(%location, "no persisted credential");
            return Ok(None);
        };
        let credential = decode(&location, secret.value.as_bytes())?;
        Ok(Some(StoredCredential { credential, revision: Revision(secret.version) }))
    }

    async fn save(
        &self,
        credential: &Credential,
        expected: Option<&Revision>,
    ) -> Result<Revision, TokenError> {
        let location = self.location();
        let bytes = encode(&location, credential)?;
        let value = String::from_utf8(bytes).map_err(|e| TokenError::storage(&location, e))?;
        let expected = expected.map(|r| r.0.as_str());

        match self.backend.put_secret(&self.name, &value, expected).await {
            Ok(version) => {
                tracing::debug!(%location, %version, "persisted credential");
                Ok(Revision(version))
            }
            Err(SecretStoreError::Conflict) => Err(conflict(&location)),
            Err(e) => Err(TokenError::storage(&location, e)),
        }
    }

    fn location(&self) -> String {
        format!("{}/{}", self.backend.describe(), self.name)
    }
}

/// In-process [`SecretStore`] with monotonically increasing versions.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, (String, u64)>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>, SecretStoreError> {
        let secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(secrets
            .get(name)
            .map(|(value, version)| Secret { value: value.clone(), version: version.to_string() }))
    }

    async fn put_secret(
        &self,
        name: &str,
        value: &str,
        expected_version: Option<&str>,
    ) -> Result<String, SecretStoreError> {
        let mut secrets = self.secrets.lock().unwrap_or_else(PoisonError::into_inner);
        let current = secrets.get(name).map(|(_, v)| *v);
        if let Some(expected) = expected_version {
            if current.map(|v| v.to_string()).as_deref() != Some(expected) {
                return Err(SecretStoreError::Conflict);
            }
        }
        let next = current.unwrap_or(0) + 1;
        secrets.insert(name.to_owned(), (value.to_owned(), next));
        Ok(next.to_string())
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
