// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HashiCorp Vault KV v2 backend for [`SecretStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::secret::{Secret, SecretStore, SecretStoreError};

/// KV v2 secrets engine client. Each secret is one `value` string field.
#[derive(Clone)]
pub struct VaultKvStore {
    client: reqwest::Client,
    addr: String,
    token: String,
    mount: String,
}

#[derive(Deserialize)]
struct ReadResponse {
    data: ReadData,
}

#[derive(Deserialize)]
struct ReadData {
    #[serde(default)]
    data: Option<SecretFields>,
    metadata: VersionMetadata,
}

#[derive(Deserialize)]
struct SecretFields {
    value: String,
}

#[derive(Deserialize)]
struct VersionMetadata {
    version: u64,
}

#[derive(Deserialize)]
struct WriteResponse {
    data: VersionMetadata,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WriteOptions>,
    data: SecretFieldsRef<'a>,
}

#[derive(Serialize)]
struct WriteOptions {
    cas: u64,
}

#[derive(Serialize)]
struct SecretFieldsRef<'a> {
    value: &'a str,
}

impl VaultKvStore {
    pub fn new(
        client: reqwest::Client,
        addr: impl Into<String>,
        token: impl Into<String>,
        mount: impl Into<String>,
    ) -> Self {
        Self {
            client,
            addr: addr.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            mount: mount.into().trim_matches('/').to_owned(),
        }
    }

    fn data_url(&self, name: &str) -> String {
        format!("{}/v1/{}/data/{}", self.addr, self.mount, name.trim_start_matches('/'))
    }
}

impl std::fmt::Debug for VaultKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKvStore")
            .field("addr", &self.addr)
            .field("mount", &self.mount)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl SecretStore for VaultKvStore {
    async fn get_secret(&self, name: &str) -> Result<Option<Secret>, SecretStoreError> {
        let resp = self
            .client
            .get(self.data_url(name))
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| SecretStoreError::Backend(format!("vault request failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SecretStoreError::Backend(format!("vault read returned {status}: {body}")));
        }

        let parsed: ReadResponse = serde_json::from_str(&body)
            .map_err(|e| SecretStoreError::Backend(format!("invalid vault read response: {e}")))?;
        // A soft-deleted latest version reads back with `data: null`.
        Ok(parsed.data.data.map(|fields| Secret {
            value: fields.value,
            version: parsed.data.metadata.version.to_string(),
        }))
    }

    async fn put_secret(
        &self,
        name: &str,
        value: &str,
        expected_version: Option<&str>,
    ) -> Result<String, SecretStoreError> {
        let options = match expected_version {
            Some(v) => Some(WriteOptions {
                cas: v.parse().map_err(|_| SecretStoreError::Backend(format!("bad version {v:?}")))?,
            }),
            None => None,
        };
        let request = WriteRequest { options, data: SecretFieldsRef { value } };

        let resp = self
            .client
            .post(self.data_url(name))
            .header("X-Vault-Token", &self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| SecretStoreError::Backend(format!("vault request failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST && body.contains("check-and-set") {
            return Err(SecretStoreError::Conflict);
        }
        if !status.is_success() {
            return Err(SecretStoreError::Backend(format!("vault write returned {status}: {body}")));
        }

        let parsed: WriteResponse = serde_json::from_str(&body)
            .map_err(|e| SecretStoreError::Backend(format!("invalid vault write response: {e}")))?;
        Ok(parsed.data.version.to_string())
    }

    fn describe(&self) -> String {
        format!("vault:{}/{}", self.addr, self.mount)
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
