// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: load/save a JSON file with atomic writes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{conflict, decode, encode, CredentialStore, Revision, StoredCredential};
use crate::credential::Credential;
use crate::error::TokenError;

/// A credential stored as a JSON file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>, TokenError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TokenError::storage(self.location(), e)),
        }
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn load(&self) -> Result<Option<StoredCredential>, TokenError> {
        let Some(bytes) = self.read_bytes()? else {
            tracing::debug!(path = %self.path.display(), "no persisted credential");
            return Ok(None);
        };
        let credential = decode(&self.location(), &bytes)?;
        Ok(Some(StoredCredential { credential, revision: digest(&bytes) }))
    }

    async fn save(
        &self,
        credential: &Credential,
        expected: Option<&Revision>,
    ) -> Result<Revision, TokenError> {
        let location = self.location();
        let _lock = WriteLock::acquire(&self.path, LOCK_WAIT)
            .await
            .map_err(|e| TokenError::storage(&location, e))?;
        if let Some(expected) = expected {
            let current = self.read_bytes()?.map(|bytes| digest(&bytes));
            if current.as_ref() != Some(expected) {
                return Err(conflict(&location));
            }
        }

        let bytes = encode(&location, credential)?;
        write_atomic(&self.path, &bytes).map_err(|e| TokenError::storage(&location, e))?;
        tracing::debug!(path = %self.path.display(), "persisted credential");
        Ok(digest(&bytes))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// How long a save waits for another writer's lock.
const LOCK_WAIT: Duration = Duration::from_secs(5);
const LOCK_POLL: Duration = Duration::from_millis(20);
/// A lock older than this was left by a crashed writer.
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// Exclusive `<file>.lock` sidecar held across the revision check and the
/// rename, so two processes cannot both pass the check.
#[derive(Debug)]
struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    async fn acquire(target: &Path, wait: Duration) -> std::io::Result<Self> {
        let path = sidecar(target, "lock");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let deadline = Instant::now() + wait;
        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        tracing::warn!(lock = %path.display(), "removing stale credential lock");
                        let _ = std::fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(std::io::Error::new(
                            ErrorKind::TimedOut,
                            format!("{} is held by another writer", path.display()),
                        ));
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn is_stale(lock: &Path) -> bool {
    std::fs::metadata(lock)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!("{name}.{suffix}"))
}

/// Write via a uniquely named temp file and rename over the target.
///
/// The temp name carries PID + counter so concurrent writers never share a
/// temp file. On Unix the file is created with mode 0600.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = sidecar(path, &format!("{}.{seq}.tmp", std::process::id()));

    let result = write_private(&tmp_path, bytes).and_then(|()| std::fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file =
        std::fs::OpenOptions::new().write(true).create_new(true).mode(0o600).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

fn digest(bytes: &[u8]) -> Revision {
    let hash = Sha256::digest(bytes);
    Revision(hash.iter().map(|b| format!("{b:02x}")).collect())
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
