// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Failure taxonomy for the token lifecycle.
///
/// Only "no persisted credential yet" is treated as a normal condition and is
/// represented as `Ok(None)` by the loaders; everything else surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Persisted data exists but cannot be parsed. Never retried.
    #[error("credential at {location} is corrupt: {reason}")]
    CredentialCorrupt { location: String, reason: String },

    /// The provider rejected a grant, or no usable credential is available.
    #[error("{provider} authentication failed: {reason}")]
    Authentication { provider: String, reason: String },

    /// Persistence backend failure or a conditional-write conflict.
    #[error("credential storage error at {location}: {reason}")]
    Storage { location: String, reason: String },

    #[error("invalid provider configuration: {0}")]
    Config(String),
}

impl TokenError {
    pub fn authentication(provider: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Authentication { provider: provider.into(), reason: reason.to_string() }
    }

    pub fn corrupt(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::CredentialCorrupt { location: location.into(), reason: reason.to_string() }
    }

    pub fn storage(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Storage { location: location.into(), reason: reason.to_string() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CredentialCorrupt { .. } => ErrorCode::CredentialCorrupt,
            Self::Authentication { .. } => ErrorCode::Authentication,
            Self::Storage { .. } => ErrorCode::Storage,
            Self::Config(_) => ErrorCode::Config,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Config,
    Authentication,
    CredentialCorrupt,
    Storage,
}

impl ErrorCode {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config => 2,
            Self::Authentication => 3,
            Self::CredentialCorrupt => 4,
            Self::Storage => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Authentication => "AUTHENTICATION",
            Self::CredentialCorrupt => "CREDENTIAL_CORRUPT",
            Self::Storage => "STORAGE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
