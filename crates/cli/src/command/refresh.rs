// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vitalsync refresh` keeps tokens valid from cron or a systemd timer.
//!
//! Never prompts. Every selected provider is attempted; the first failure
//! decides the exit code.

use vitalsync_auth::TokenError;

use crate::config::{Config, ProviderName};
use crate::providers::{self, ClientCredentials};

#[derive(Debug, clap::Args)]
pub struct RefreshArgs {
    /// Only refresh the Fitbit credential.
    #[arg(long, conflicts_with = "google_only")]
    pub fitbit_only: bool,

    /// Only refresh the Google credential.
    #[arg(long)]
    pub google_only: bool,

    /// Refresh even if the current token is still valid.
    #[arg(long)]
    pub force: bool,
}

impl RefreshArgs {
    pub fn selected(&self) -> Vec<ProviderName> {
        match (self.fitbit_only, self.google_only) {
            (true, _) => vec![ProviderName::Fitbit],
            (_, true) => vec![ProviderName::Google],
            _ => ProviderName::ALL.to_vec(),
        }
    }
}

pub async fn run(config: &Config, args: &RefreshArgs) -> Result<(), TokenError> {
    let mut first_error = None;

    for provider in args.selected() {
        match refresh_one(config, provider, args.force).await {
            Ok(()) => tracing::info!(%provider, "token valid"),
            Err(e) => {
                tracing::error!(%provider, code = %e.code(), err = %e, "refresh failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn refresh_one(config: &Config, provider: ProviderName, force: bool) -> Result<(), TokenError> {
    let manager = providers::manager(config, provider, ClientCredentials::Required)?;
    if force {
        manager.refresh().await?;
    } else {
        manager.get_valid_token().await?;
    }
    Ok(())
}
