// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Smoke tests for the `vitalsync` binary against a stub token endpoint.

use std::path::Path;
use std::process::Output;

use serde_json::{json, Value};
use tokio::process::Command;

use vitalsync_auth::credential::epoch_secs;
use vitalsync_auth::store::{CredentialStore, FileStore};
use vitalsync_auth::test_support::{credential, StubTokenServer};

/// Run the binary with a scrubbed environment rooted at `dir`.
async fn vitalsync(dir: &Path, env: &[(&str, &str)], args: &[&str]) -> anyhow::Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_vitalsync"))
        .env_clear()
        .current_dir(dir)
        .env("VITALSYNC_LOG_LEVEL", "warn")
        .envs(env.iter().copied())
        .args(args)
        .output()
        .await?;
    Ok(output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[tokio::test(flavor = "multi_thread")]
async fn token_refreshes_expired_credential_and_rewrites_file() -> anyhow::Result<()> {
    let server = StubTokenServer::start(vec![(
        200,
        json!({"access_token": "fresh", "refresh_token": "R2", "expires_in": 28800}),
    )])
    .await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("credentials/fitbit_token.json");
    FileStore::new(&path).save(&credential("stale", Some("R1"), epoch_secs() - 10), None).await?;

    let token_url = server.token_url();
    let env = [
        ("FITBIT_CLIENT_ID", "id"),
        ("FITBIT_CLIENT_SECRET", "secret"),
        ("FITBIT_TOKEN_URL", token_url.as_str()),
    ];
    let output = vitalsync(dir.path(), &env, &["token", "fitbit"]).await?;

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output).trim(), "fresh");
    assert_eq!(server.calls(), 1);

    let persisted: Value = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(persisted["access_token"], "fresh");
    assert_eq!(persisted["refresh_token"], "R2");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_absent_credentials() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = vitalsync(dir.path(), &[], &["status"]).await?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let lines: Vec<Value> =
        stdout(&output).lines().map(serde_json::from_str::<Value>).collect::<Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["provider"], "fitbit");
    assert_eq!(lines[0]["state"], "absent");
    assert_eq!(lines[1]["provider"], "google");
    assert_eq!(lines[1]["has_refresh_token"], false);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reads_token_path_from_environment() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("elsewhere.json");
    FileStore::new(&path).save(&credential("A", Some("R"), epoch_secs() + 3600), None).await?;
    let path_env = path.to_string_lossy().into_owned();

    let output =
        vitalsync(dir.path(), &[("FITBIT_TOKEN_PATH", path_env.as_str())], &["status", "fitbit"])
            .await?;
    let line: Value = serde_json::from_str(stdout(&output).trim())?;
    assert_eq!(line["state"], "valid");
    assert_eq!(line["has_refresh_token"], true);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_credential_exits_with_code_4() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("credentials"))?;
    std::fs::write(dir.path().join("credentials/fitbit_token.json"), "{\"access_token\": ")?;

    let env = [("FITBIT_CLIENT_ID", "id"), ("FITBIT_CLIENT_SECRET", "secret")];
    let output = vitalsync(dir.path(), &env, &["token", "fitbit"]).await?;
    assert_eq!(output.status.code(), Some(4));
    assert!(stdout(&output).is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_credential_exits_with_code_3_without_prompting() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let env = [("FITBIT_CLIENT_ID", "id"), ("FITBIT_CLIENT_SECRET", "secret")];
    let output = vitalsync(dir.path(), &env, &["refresh", "--fitbit-only"]).await?;
    assert_eq!(output.status.code(), Some(3));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_client_id_exits_with_code_2() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = vitalsync(dir.path(), &[], &["token", "fitbit"]).await?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_refresh_flags_are_a_usage_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = vitalsync(dir.path(), &[], &["refresh", "--fitbit-only", "--google-only"]).await?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
