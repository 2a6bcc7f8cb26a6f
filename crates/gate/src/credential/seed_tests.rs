// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |name| map.get(name).cloned()
}

#[test]
fn env_seeds_both_kinds() {
    let seeds = from_env(env(&[(FACTORY_KEY_ENV, "fk_env_key_123"), (REFRESH_TOKEN_ENV, "rt_env")]));
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[0].kind, TokenKind::FactoryKey);
    assert_eq!(seeds[0].secret, "fk_env_key_123");
    assert_eq!(seeds[0].label, "Environment (FACTORY_API_KEY)");
    assert_eq!(seeds[1].kind, TokenKind::RefreshToken);
    assert!(seeds.iter().all(|s| s.source == SeedSource::Environment));
}

#[test]
fn env_ignores_blank_and_trims() {
    let seeds = from_env(env(&[(FACTORY_KEY_ENV, "   "), (REFRESH_TOKEN_ENV, "  rt_padded \n")]));
    assert_eq!(seeds.len(), 1);
    assert_eq!(seeds[0].secret, "rt_padded");
}

#[test]
fn legacy_parses_both_fields() -> anyhow::Result<()> {
    let seeds = parse_legacy_auth(r#"{"access_token": "fk_legacy", "refresh_token": "rt_legacy"}"#)?;
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[0].kind, TokenKind::FactoryKey);
    assert_eq!(seeds[1].kind, TokenKind::RefreshToken);
    assert!(seeds.iter().all(|s| s.label == LEGACY_LABEL && s.source == SeedSource::LegacyFile));
    Ok(())
}

#[test]
fn legacy_with_only_refresh_token() -> anyhow::Result<()> {
    let seeds = parse_legacy_auth(r#"{"access_token": "", "refresh_token": "rt_only"}"#)?;
    assert_eq!(seeds.len(), 1);
    assert_eq!(seeds[0].secret, "rt_only");
    Ok(())
}

#[yare::parameterized(
    not_json   = { "not json" },
    array      = { "[1, 2]" },
)]
fn legacy_rejects_malformed(input: &str) {
    assert!(parse_legacy_auth(input).is_err());
}

#[test]
fn legacy_file_missing_or_malformed_yields_nothing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(from_legacy_file(&dir.path().join("auth.json")).is_empty());

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ truncated")?;
    assert!(from_legacy_file(&bad).is_empty());
    Ok(())
}

#[test]
#[serial_test::serial]
fn collect_reads_process_environment_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let legacy = dir.path().join("auth.json");
    std::fs::write(&legacy, r#"{"refresh_token": "rt_from_file"}"#)?;

    std::env::set_var(FACTORY_KEY_ENV, "fk_from_env_0001");
    std::env::remove_var(REFRESH_TOKEN_ENV);
    let seeds = collect(Some(&legacy));
    std::env::remove_var(FACTORY_KEY_ENV);

    let secrets: Vec<&str> = seeds.iter().map(|s| s.secret.as_str()).collect();
    assert_eq!(secrets, vec!["fk_from_env_0001", "rt_from_file"]);
    Ok(())
}

#[test]
fn seed_debug_masks_secret() {
    let seeds = from_env(env(&[(FACTORY_KEY_ENV, "fk_supersecretvalue")]));
    let debug = format!("{:?}", seeds[0]);
    assert!(!debug.contains("supersecret"), "{debug}");
}
