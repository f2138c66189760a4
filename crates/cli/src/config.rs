// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::command::login::LoginArgs;
use crate::command::refresh::RefreshArgs;
use crate::command::status::StatusArgs;
use crate::command::token::TokenArgs;

/// OAuth providers the sync jobs authenticate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderName {
    Fitbit,
    Google,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::Fitbit, ProviderName::Google];
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fitbit => f.write_str("fitbit"),
            Self::Google => f.write_str("google"),
        }
    }
}

/// Where credentials are persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    #[default]
    File,
    Vault,
}

/// Keeps Fitbit and Google Sheets OAuth credentials fresh for scheduled syncs.
#[derive(Debug, Parser)]
#[command(name = "vitalsync", version, about)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "VITALSYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "VITALSYNC_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Credential backend.
    #[arg(long, env = "VITALSYNC_STORE", value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    #[arg(long, env = "FITBIT_CLIENT_ID")]
    pub fitbit_client_id: Option<String>,

    #[arg(long, env = "FITBIT_CLIENT_SECRET", hide_env_values = true)]
    pub fitbit_client_secret: Option<String>,

    /// Fitbit credential file (file store).
    #[arg(long, env = "FITBIT_TOKEN_PATH", default_value = "credentials/fitbit_token.json")]
    pub fitbit_token_path: PathBuf,

    #[arg(long, env = "FITBIT_TOKEN_URL", hide = true)]
    pub fitbit_token_url: Option<String>,

    /// Google OAuth client-secrets JSON ("installed" or "web" app).
    #[arg(long, env = "GOOGLE_CREDENTIALS_PATH", default_value = "credentials/google.json")]
    pub google_credentials_path: PathBuf,

    /// Overrides the client id from the client-secrets file.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Google credential file (file store).
    #[arg(long, env = "GOOGLE_TOKEN_PATH", default_value = "credentials/google_token.json")]
    pub google_token_path: PathBuf,

    #[arg(long, env = "GOOGLE_TOKEN_URL", hide = true)]
    pub google_token_url: Option<String>,

    /// Vault server address (vault store).
    #[arg(long, env = "VAULT_ADDR")]
    pub vault_addr: Option<String>,

    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// KV v2 mount path.
    #[arg(long, env = "VAULT_MOUNT", default_value = "secret")]
    pub vault_mount: String,

    #[arg(long, env = "FITBIT_TOKEN_SECRET_NAME", default_value = "vitalsync/fitbit-token")]
    pub fitbit_secret_name: String,

    #[arg(long, env = "GOOGLE_TOKEN_SECRET_NAME", default_value = "vitalsync/google-token")]
    pub google_secret_name: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize a provider interactively (one-time, needs a browser).
    Login(LoginArgs),
    /// Ensure valid tokens, refreshing when expired.
    Refresh(RefreshArgs),
    /// Print credential status as JSON lines.
    Status(StatusArgs),
    /// Print a valid access token for scripts.
    Token(TokenArgs),
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {} (expected json or text)", self.log_format);
        }

        if self.store == StoreKind::Vault {
            if self.vault_addr.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("--vault-addr is required with --store vault");
            }
            if self.vault_token.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("--vault-token is required with --store vault");
            }
        }

        if let Command::Login(ref login) = self.command {
            if login.timeout_secs == 0 {
                anyhow::bail!("--timeout-secs must be positive");
            }
        }
        Ok(())
    }

    pub fn token_path(&self, provider: ProviderName) -> &PathBuf {
        match provider {
            ProviderName::Fitbit => &self.fitbit_token_path,
            ProviderName::Google => &self.google_token_path,
        }
    }

    pub fn secret_name(&self, provider: ProviderName) -> &str {
        match provider {
            ProviderName::Fitbit => &self.fitbit_secret_name,
            ProviderName::Google => &self.google_secret_name,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
