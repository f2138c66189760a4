// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `login`, `refresh`, `status`, `token`.

pub mod login;
pub mod refresh;
pub mod status;
pub mod token;

use vitalsync_auth::TokenError;

use crate::config::{Command, Config};

/// Dispatch the parsed subcommand.
pub async fn run(config: &Config) -> Result<(), TokenError> {
    match &config.command {
        Command::Login(args) => login::run(config, args).await,
        Command::Refresh(args) => refresh::run(config, args).await,
        Command::Status(args) => status::run(config, args).await,
        Command::Token(args) => token::run(config, args).await,
    }
}
