// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `credgate` binary.

use std::time::Duration;

use credgate_specs::GateProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let gate = GateProcess::build().factory_key("fk_smoke_env_key").spawn()?;
    gate.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", gate.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["factoryKeys"], 1);
    assert_eq!(resp["refreshTokens"], 0);
    assert_eq!(resp["adminSecretConfigured"], true);
    Ok(())
}

#[tokio::test]
async fn admin_state_requires_secret() -> anyhow::Result<()> {
    let gate = GateProcess::start()?;
    gate.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/admin/state", gate.base_url());

    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let state: serde_json::Value =
        client.get(&url).bearer_auth(gate.admin_secret()).send().await?.json().await?;
    assert_eq!(state["auth"]["adminSecretConfigured"], true);
    assert_eq!(state["tokens"]["factoryKeys"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn added_token_is_persisted_masked() -> anyhow::Result<()> {
    let gate = GateProcess::start()?;
    gate.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let added: serde_json::Value = client
        .post(format!("{}/api/v1/admin/tokens", gate.base_url()))
        .bearer_auth(gate.admin_secret())
        .json(&serde_json::json!({ "kind": "factory_key", "secret": "fk_smoke_added_key" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(added["secret"], "fk_s..._key");

    let stored = std::fs::read_to_string(gate.data_dir().join("tokens.json"))?;
    assert!(stored.contains("fk_smoke_added_key"));
    Ok(())
}

#[tokio::test]
async fn proxy_without_credentials_is_unauthorized() -> anyhow::Result<()> {
    let gate = GateProcess::start()?;
    gate.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::Client::new()
        .post(format!("{}/v1/messages", gate.base_url()))
        .json(&serde_json::json!({}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    Ok(())
}
