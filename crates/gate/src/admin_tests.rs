// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::credential::seed::SeedSource;
use crate::engine::{CredentialEngine, EngineOptions};
use crate::error::CredentialError;
use crate::test_support::{access_token_body, mock_token_server, MockTokenServer};

fn engine(dir: &tempfile::TempDir, server: &MockTokenServer, seeds: Vec<SeedRecord>) -> CredentialEngine {
    let mut options = EngineOptions::new(dir.path().join("tokens.json"));
    options.admin_secret = Some("s3cr3t".into());
    options.refresh_endpoint = server.endpoint();
    CredentialEngine::start(options, seeds)
}

#[yare::parameterized(
    add = {
        json!({"command": "add_token", "kind": "factory_key", "secret": "fk_x", "label": "L"}),
        AdminCommand::AddToken { kind: TokenKind::FactoryKey, secret: "fk_x".into(), label: Some("L".into()) }
    },
    add_no_label = {
        json!({"command": "add_token", "kind": "refresh_token", "secret": "rt_x"}),
        AdminCommand::AddToken { kind: TokenKind::RefreshToken, secret: "rt_x".into(), label: None }
    },
    remove = {
        json!({"command": "remove_token", "kind": "factory_key", "id": "abc"}),
        AdminCommand::RemoveToken { kind: TokenKind::FactoryKey, id: "abc".into() }
    },
    activate = {
        json!({"command": "activate_token", "kind": "refresh_token", "id": "abc"}),
        AdminCommand::ActivateToken { kind: TokenKind::RefreshToken, id: "abc".into() }
    },
    reload = { json!({"command": "reload"}), AdminCommand::Reload },
    refresh = { json!({"command": "refresh"}), AdminCommand::Refresh },
)]
fn parses_admin_command(value: serde_json::Value, expected: AdminCommand) {
    let parsed: Option<AdminCommand> = serde_json::from_value(value).ok();
    assert_eq!(parsed, Some(expected));
}

#[yare::parameterized(
    unknown_command = { json!({"command": "drop_everything"}) },
    missing_secret  = { json!({"command": "add_token", "kind": "factory_key"}) },
    bad_kind        = { json!({"command": "remove_token", "kind": "password", "id": "a"}) },
    untagged        = { json!({"kind": "factory_key", "id": "a"}) },
)]
fn rejects_malformed_command(value: serde_json::Value) {
    assert!(serde_json::from_value::<AdminCommand>(value).is_err());
}

#[tokio::test]
async fn state_is_masked() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(vec![access_token_body("at_state_token_1")], Duration::ZERO).await?;
    let engine = engine(&dir, &server, vec![]);
    let projector = engine.projector();

    projector.add_token(TokenKind::FactoryKey, "fk_abcdefgh1234", Some("Main"))?;
    projector.add_token(TokenKind::RefreshToken, "rt_abcdefgh5678", None)?;
    projector.refresh().await?;

    let state = projector.get_state();
    let json = serde_json::to_string(&state)?;
    for secret in ["fk_abcdefgh1234", "rt_abcdefgh5678", "at_state_token_1"] {
        assert!(!json.contains(secret), "leaked {secret}: {json}");
    }
    assert_eq!(state.tokens.factory_keys[0].secret, "fk_a...1234");
    assert_eq!(state.auth.masked_active_access_token.as_deref(), Some("at_s...en_1"));
    assert!(state.refresh.has_access_token);
    assert_eq!(state.refresh_interval_secs, 21_600);
    Ok(())
}

#[tokio::test]
async fn execute_round_trips_each_command() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(vec![access_token_body("at_cmd_refresh")], Duration::ZERO).await?;
    let engine = engine(&dir, &server, vec![]);
    let projector = engine.projector();

    let added = projector
        .execute(AdminCommand::AddToken {
            kind: TokenKind::RefreshToken,
            secret: "rt_command_added".into(),
            label: None,
        })
        .await?;
    let CommandOutcome::Token(record) = added else {
        anyhow::bail!("expected token outcome, got {added:?}");
    };
    assert_eq!(record.label, "Refresh token 1");

    let refreshed = projector.execute(AdminCommand::Refresh).await?;
    assert_eq!(
        refreshed,
        CommandOutcome::Refreshed { masked_access_token: "at_c...resh".into() }
    );

    let activated = projector
        .execute(AdminCommand::ActivateToken { kind: TokenKind::RefreshToken, id: record.id.clone() })
        .await?;
    assert_eq!(activated, CommandOutcome::Token(record.clone()));

    let removed = projector
        .execute(AdminCommand::RemoveToken { kind: TokenKind::RefreshToken, id: record.id.clone() })
        .await?;
    assert_eq!(removed, CommandOutcome::Removed { kind: TokenKind::RefreshToken, id: record.id });

    let reloaded = projector.execute(AdminCommand::Reload).await?;
    let CommandOutcome::Reloaded(snapshot) = reloaded else {
        anyhow::bail!("expected reload outcome");
    };
    assert!(snapshot.refresh_tokens.is_empty());
    Ok(())
}

#[tokio::test]
async fn outcome_serializes_with_result_tag() -> anyhow::Result<()> {
    let outcome = CommandOutcome::Refreshed { masked_access_token: "at_c...resh".into() };
    let json = serde_json::to_value(&outcome)?;
    assert_eq!(json, json!({"result": "refreshed", "maskedAccessToken": "at_c...resh"}));
    Ok(())
}

#[tokio::test]
async fn remove_read_only_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(vec![access_token_body("at_unused")], Duration::ZERO).await?;
    let seeds = vec![SeedRecord {
        source: SeedSource::Environment,
        kind: TokenKind::FactoryKey,
        secret: "fk_environment_1".into(),
        label: "Environment (FACTORY_API_KEY)".into(),
    }];
    let engine = engine(&dir, &server, seeds);
    let id = engine.projector().get_state().tokens.active_factory_key_id.unwrap_or_default();

    let err = engine.projector().remove_token(TokenKind::FactoryKey, &id).err();
    assert!(matches!(err, Some(CredentialError::ImmutableRecord { .. })));
    Ok(())
}

#[tokio::test]
async fn reload_drops_cached_access_token_and_keeps_seeds() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(
        vec![access_token_body("at_before_reload"), access_token_body("at_after_reload")],
        Duration::ZERO,
    )
    .await?;
    let seeds = vec![SeedRecord {
        source: SeedSource::Environment,
        kind: TokenKind::RefreshToken,
        secret: "rt_environment_1".into(),
        label: "Environment (DROID_REFRESH_KEY)".into(),
    }];
    let engine = engine(&dir, &server, seeds);

    assert_eq!(engine.refresh().ensure_access_token_valid().await?, "at_before_reload");
    std::fs::remove_file(dir.path().join("tokens.json"))?;

    let snapshot = engine.projector().reload();
    assert_eq!(snapshot.refresh_tokens.len(), 1);
    assert!(snapshot.refresh_tokens[0].read_only);
    assert!(!engine.refresh().cache_info().has_access_token);

    assert_eq!(engine.refresh().ensure_access_token_valid().await?, "at_after_reload");
    assert_eq!(server.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn refresh_without_refresh_token_is_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(vec![access_token_body("at_unused")], Duration::ZERO).await?;
    let engine = engine(&dir, &server, vec![]);
    let err = engine.projector().execute(AdminCommand::Refresh).await.err();
    assert_eq!(err, Some(CredentialError::NoRefreshTokenConfigured));
    Ok(())
}

#[tokio::test]
async fn refresh_command_reports_failed_exchange() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let server = mock_token_server(
        vec![access_token_body("at_good_token"), (500, "down".to_owned())],
        Duration::ZERO,
    )
    .await?;
    let engine = engine(&dir, &server, vec![]);
    engine.store().add(TokenKind::RefreshToken, "rt_admin_refresh", None)?;

    let first = engine.projector().execute(AdminCommand::Refresh).await?;
    assert_eq!(first, CommandOutcome::Refreshed { masked_access_token: "at_g...oken".into() });

    let err = engine.projector().execute(AdminCommand::Refresh).await.err();
    assert!(matches!(err, Some(CredentialError::RefreshExchangeFailed(_))), "{err:?}");
    let state = engine.projector().get_state();
    assert_eq!(state.auth.last_refresh_outcome, crate::status::RefreshOutcome::Error);
    assert!(state.refresh.has_access_token);

    // Proxied traffic keeps the last good token.
    assert_eq!(engine.refresh().ensure_access_token_valid().await?, "at_good_token");
    assert_eq!(server.calls(), 2);
    Ok(())
}
