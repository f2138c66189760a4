// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn code_verifier_is_valid_length() -> anyhow::Result<()> {
    let v = generate_code_verifier();
    assert!(v.len() >= 43 && v.len() <= 128, "verifier length {} out of range", v.len());
    Ok(())
}

#[test]
fn code_challenge_matches_rfc7636_example() -> anyhow::Result<()> {
    // RFC 7636 appendix B.
    let challenge = compute_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
    assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    Ok(())
}

#[test]
fn state_is_unique() -> anyhow::Result<()> {
    let s1 = generate_state();
    let s2 = generate_state();
    assert_ne!(s1, s2);
    Ok(())
}

#[test]
fn fitbit_auth_url_includes_pkce_params() -> anyhow::Result<()> {
    let provider = ProviderConfig::fitbit("23ABCD", "secret");
    let url = build_auth_url(&provider, "state-xyz", Some("challenge-abc"))?;
    assert!(url.starts_with("https://www.fitbit.com/oauth2/authorize?response_type=code&"));
    assert!(url.contains("client_id=23ABCD"));
    assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2F"));
    assert!(url.contains("scope=sleep+heartrate"));
    assert!(url.contains("code_challenge=challenge-abc"));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains("state=state-xyz"));
    Ok(())
}

#[test]
fn param_order_ends_with_provider_extras() -> anyhow::Result<()> {
    let provider = ProviderConfig::google_sheets("gid", "secret");
    let url = build_auth_url(&provider, "s", Some("c"))?;
    let q = url.split('?').nth(1).unwrap_or_default();
    let keys: Vec<&str> = q.split('&').map(|p| p.split('=').next().unwrap_or_default()).collect();
    assert_eq!(
        keys,
        [
            "response_type",
            "client_id",
            "redirect_uri",
            "scope",
            "state",
            "code_challenge",
            "code_challenge_method",
            "access_type",
            "prompt",
        ],
    );
    Ok(())
}

#[test]
fn no_challenge_omits_pkce_params() -> anyhow::Result<()> {
    let provider = ProviderConfig::fitbit("id", "secret");
    let url = build_auth_url(&provider, "s", None)?;
    assert!(!url.contains("code_challenge"));
    Ok(())
}
