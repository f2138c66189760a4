// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;

use super::*;

fn token(json: serde_json::Value) -> TokenResponse {
    serde_json::from_value(json).expect("token response")
}

fn sample(now: u64) -> Credential {
    Credential::from_authorization(
        token(serde_json::json!({
            "access_token": "A",
            "refresh_token": "R",
            "expires_in": 3600,
            "scope": "sleep heartrate",
            "user_id": "ABC123",
            "token_type": "Bearer",
        })),
        &[],
        now,
    )
}

#[test]
fn authorization_sets_absolute_expiry_and_metadata() {
    let cred = sample(1_000);
    assert_eq!(cred.access_token(), "A");
    assert_eq!(cred.refresh_token(), Some("R"));
    assert_eq!(cred.expires_at(), 4_600);
    assert!(cred.scope().contains("sleep"));
    assert!(cred.scope().contains("heartrate"));
    assert_eq!(cred.provider_metadata().get("user_id"), Some(&serde_json::json!("ABC123")));
    assert_eq!(cred.provider_metadata().get("token_type"), Some(&serde_json::json!("Bearer")));
}

#[test]
fn authorization_without_scope_uses_requested_scopes() {
    let requested = vec!["https://www.googleapis.com/auth/spreadsheets".to_owned()];
    let cred = Credential::from_authorization(
        token(serde_json::json!({"access_token": "A"})),
        &requested,
        0,
    );
    assert_eq!(cred.scope().len(), 1);
    assert_eq!(cred.expires_at(), DEFAULT_TOKEN_LIFETIME_SECS);
    assert!(!cred.has_refresh_token());
}

#[test]
fn refresh_keeps_prior_refresh_token_when_not_rotated() {
    let cred = sample(0);
    let next = cred.refreshed(token(serde_json::json!({"access_token": "B", "expires_in": 60})), 100);
    assert_eq!(next.access_token(), "B");
    assert_eq!(next.refresh_token(), Some("R"));
    assert_eq!(next.expires_at(), 160);
    assert_eq!(next.scope(), cred.scope());
    assert_eq!(next.provider_metadata().get("user_id"), Some(&serde_json::json!("ABC123")));
}

#[test]
fn refresh_adopts_rotated_refresh_token_and_scope() {
    let cred = sample(0);
    let next = cred.refreshed(
        token(serde_json::json!({
            "access_token": "B",
            "refresh_token": "R2",
            "expires_in": 3600,
            "scope": "sleep",
        })),
        0,
    );
    assert_eq!(next.refresh_token(), Some("R2"));
    assert_eq!(next.scope().len(), 1);
}

#[test]
fn debug_output_redacts_tokens() {
    let rendered = format!("{:?}", sample(0));
    assert!(!rendered.contains("\"A\""));
    assert!(!rendered.contains("\"R\""));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn persisted_form_round_trips_field_names() -> anyhow::Result<()> {
    let json: serde_json::Value = serde_json::from_slice(&sample(0).to_json()?)?;
    assert_eq!(json["access_token"], "A");
    assert_eq!(json["refresh_token"], "R");
    assert_eq!(json["expires_at"], 3600);
    assert_eq!(json["provider_metadata"]["user_id"], "ABC123");
    let back = Credential::from_json(&serde_json::to_vec(&json)?)?;
    assert_eq!(back, sample(0));
    Ok(())
}

#[yare::parameterized(
    far_future = { 10_000, 1_000, CredentialState::Valid },
    just_outside_margin = { 1_061, 1_000, CredentialState::Valid },
    at_margin = { 1_060, 1_000, CredentialState::Expired },
    inside_margin = { 1_030, 1_000, CredentialState::Expired },
    already_past = { 990, 1_000, CredentialState::Expired },
)]
fn state_honours_the_margin(expires_at: u64, now: u64, expected: CredentialState) {
    let mut cred = sample(0);
    cred.expires_at = expires_at;
    assert_eq!(cred.state(now, DEFAULT_EXPIRY_MARGIN_SECS), expected);
}

#[test]
fn status_summarises_without_tokens() {
    let cred = sample(1_000);
    let status = cred.status("fitbit", 1_600, DEFAULT_EXPIRY_MARGIN_SECS);
    assert_eq!(status.state, CredentialState::Valid);
    assert_eq!(status.expires_in_secs, Some(3_000));
    assert!(status.has_refresh_token);
    assert_eq!(CredentialStatus::absent("google").state, CredentialState::Absent);
}

proptest! {
    #[test]
    fn margin_boundary_is_exact(now in 0u64..u64::MAX / 2, remaining in 0u64..100_000) {
        let mut cred = sample(0);
        cred.expires_at = now + remaining;
        prop_assert_eq!(
            cred.is_expired(now, DEFAULT_EXPIRY_MARGIN_SECS),
            remaining <= DEFAULT_EXPIRY_MARGIN_SECS
        );
    }
}
