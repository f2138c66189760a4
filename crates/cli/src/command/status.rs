// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vitalsync status` prints one JSON line per provider. Never refreshes.

use vitalsync_auth::TokenError;

use crate::config::{Config, ProviderName};
use crate::providers::{self, ClientCredentials};

#[derive(Debug, clap::Args)]
pub struct StatusArgs {
    /// Limit output to one provider.
    pub provider: Option<ProviderName>,
}

pub async fn run(config: &Config, args: &StatusArgs) -> Result<(), TokenError> {
    let selected = match args.provider {
        Some(p) => vec![p],
        None => ProviderName::ALL.to_vec(),
    };

    for provider in selected {
        let manager = providers::manager(config, provider, ClientCredentials::Optional)?;
        let status = manager.status().await?;
        let line = serde_json::to_string(&status)
            .map_err(|e| TokenError::Config(format!("cannot encode status: {e}")))?;
        println!("{line}");
    }
    Ok(())
}
