// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider endpoints, client credentials, and presets.

use std::path::Path;

use reqwest::Url;
use serde::Deserialize;

use crate::error::TokenError;

pub const FITBIT_AUTHORIZE_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/";

/// How the client authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// `Authorization: Basic base64(client_id:client_secret)`.
    Basic,
    /// `client_id` / `client_secret` form fields.
    RequestBody,
}

/// Everything needed to talk OAuth2 to one downstream API.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Short identifier used in logs and errors ("fitbit", "google").
    pub name: String,
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
    pub redirect_uri: String,
    pub client_auth: ClientAuth,
    pub use_pkce: bool,
    /// Extra query parameters appended to the authorization URL.
    pub extra_authorize_params: Vec<(String, String)>,
}

fn is_loopback_with_port(uri: &str) -> bool {
    Url::parse(uri).is_ok_and(|url| {
        url.scheme() == "http"
            && matches!(url.host_str(), Some("localhost" | "127.0.0.1"))
            && url.port().is_some()
    })
}

impl ProviderConfig {
    pub fn fitbit(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            name: "fitbit".to_owned(),
            authorize_url: FITBIT_AUTHORIZE_URL.to_owned(),
            token_url: FITBIT_TOKEN_URL.to_owned(),
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            scopes: vec!["sleep".to_owned(), "heartrate".to_owned()],
            redirect_uri: DEFAULT_REDIRECT_URI.to_owned(),
            client_auth: ClientAuth::Basic,
            use_pkce: true,
            extra_authorize_params: vec![],
        }
    }

    /// Google Sheets preset. `access_type=offline` plus `prompt=consent` make
    /// Google issue a refresh token on every consent.
    pub fn google_sheets(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            name: "google".to_owned(),
            authorize_url: GOOGLE_AUTHORIZE_URL.to_owned(),
            token_url: GOOGLE_TOKEN_URL.to_owned(),
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            scopes: vec![GOOGLE_SHEETS_SCOPE.to_owned()],
            redirect_uri: DEFAULT_REDIRECT_URI.to_owned(),
            client_auth: ClientAuth::RequestBody,
            use_pkce: true,
            extra_authorize_params: vec![
                ("access_type".to_owned(), "offline".to_owned()),
                ("prompt".to_owned(), "consent".to_owned()),
            ],
        }
    }

    /// Build the Google preset from a client-secrets file downloaded from the
    /// Cloud Console (`{"installed": {...}}` or `{"web": {...}}`).
    pub fn from_google_client_secrets(path: &Path) -> Result<Self, TokenError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TokenError::Config(format!("cannot read Google client secrets {}: {e}", path.display()))
        })?;
        Self::parse_google_client_secrets(&contents)
            .map_err(|e| TokenError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse_google_client_secrets(contents: &str) -> Result<Self, String> {
        let file: GoogleClientSecretsFile =
            serde_json::from_str(contents).map_err(|e| format!("malformed client secrets: {e}"))?;
        let secrets = file
            .installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_owned())?;

        let mut config = Self::google_sheets(secrets.client_id, secrets.client_secret);
        if let Some(auth_uri) = secrets.auth_uri {
            config.authorize_url = auth_uri;
        }
        if let Some(token_uri) = secrets.token_uri {
            config.token_url = token_uri;
        }
        // Only a loopback URI with an explicit port can be served locally;
        // otherwise keep the default callback port.
        if let Some(redirect) = secrets.redirect_uris.into_iter().find(|u| is_loopback_with_port(u)) {
            config.redirect_uri = redirect;
        }
        Ok(config)
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }

    pub fn validate(&self) -> Result<(), TokenError> {
        if self.name.is_empty() {
            return Err(TokenError::Config("provider name is empty".to_owned()));
        }
        if self.client_id.trim().is_empty() {
            return Err(TokenError::Config(format!("{}: client id is empty", self.name)));
        }
        if self.client_auth == ClientAuth::Basic && self.client_secret.is_none() {
            return Err(TokenError::Config(format!(
                "{}: basic client authentication needs a client secret",
                self.name
            )));
        }
        if self.scopes.is_empty() {
            return Err(TokenError::Config(format!("{}: no scopes requested", self.name)));
        }
        for (field, value) in [
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("redirect_uri", &self.redirect_uri),
        ] {
            Url::parse(value).map_err(|e| {
                TokenError::Config(format!("{}: invalid {field} {value:?}: {e}", self.name))
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .field("redirect_uri", &self.redirect_uri)
            .field("client_auth", &self.client_auth)
            .field("use_pkce", &self.use_pkce)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GoogleClientSecretsFile {
    #[serde(default)]
    installed: Option<GoogleClientSecrets>,
    #[serde(default)]
    web: Option<GoogleClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct GoogleClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
