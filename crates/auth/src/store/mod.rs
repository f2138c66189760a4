// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence backends.
//!
//! A store holds exactly one credential. Loads distinguish "never written"
//! (`Ok(None)`) from unreadable data (`CredentialCorrupt`). Saves may be
//! conditional on the revision that was read so a concurrently rotated
//! refresh token is never silently overwritten.

pub mod file;
pub mod secret;
pub mod vault;

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::TokenError;

pub use file::FileStore;
pub use secret::{MemorySecretStore, Secret, SecretCredentialStore, SecretStore, SecretStoreError};
pub use vault::VaultKvStore;

/// Opaque marker of the stored version (file digest or secret version id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(pub String);

/// A loaded credential together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredential {
    pub credential: Credential,
    pub revision: Revision,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the persisted credential. `Ok(None)` only when nothing was ever
    /// written.
    async fn load(&self) -> Result<Option<StoredCredential>, TokenError>;

    /// Durably write `credential`.
    ///
    /// With `expected = Some(rev)` the write fails with a storage conflict
    /// unless the stored revision is still `rev`. `None` writes
    /// unconditionally.
    async fn save(
        &self,
        credential: &Credential,
        expected: Option<&Revision>,
    ) -> Result<Revision, TokenError>;

    /// Human-readable location for logs and errors.
    fn location(&self) -> String;
}

/// Decode a persisted credential body, treating any defect as corruption.
pub(crate) fn decode(location: &str, bytes: &[u8]) -> Result<Credential, TokenError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(TokenError::corrupt(location, "empty credential document"));
    }
    Credential::from_json(bytes).map_err(|e| TokenError::corrupt(location, e))
}

pub(crate) fn encode(location: &str, credential: &Credential) -> Result<Vec<u8>, TokenError> {
    credential.to_json().map_err(|e| TokenError::storage(location, e))
}

pub(crate) fn conflict(location: &str) -> TokenError {
    TokenError::storage(location, "conflict: credential was modified by another writer")
}
