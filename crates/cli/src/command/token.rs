// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vitalsync token` prints a valid access token for shell scripts.

use vitalsync_auth::TokenError;

use crate::config::{Config, ProviderName};
use crate::providers::{self, ClientCredentials};

#[derive(Debug, clap::Args)]
pub struct TokenArgs {
    pub provider: ProviderName,
}

pub async fn run(config: &Config, args: &TokenArgs) -> Result<(), TokenError> {
    let manager = providers::manager(config, args.provider, ClientCredentials::Required)?;
    let token = manager.get_valid_token().await?;
    println!("{token}");
    Ok(())
}
