// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::GateConfig;

fn parse(args: &[&str]) -> GateConfig {
    GateConfig::parse_from(args)
}

#[test]
#[serial_test::serial]
fn defaults_are_correct() -> anyhow::Result<()> {
    let config = parse(&["credgate"]);
    config.validate()?;
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 3000);
    assert_eq!(config.data_dir, PathBuf::from("data"));
    assert_eq!(config.store_path(), PathBuf::from("data/tokens.json"));
    assert_eq!(config.upstream_url, "https://api.factory.ai");
    assert_eq!(config.refresh_token_url, "https://api.workos.com/user_management/authenticate");
    assert_eq!(config.refresh_client_id, "client_01HNM792M5G5G1A2THWPXKFMXB");
    assert_eq!(config.refresh_interval(), Duration::from_secs(6 * 60 * 60));
    assert_eq!(config.request_log_capacity, 200);
    assert_eq!(config.log_format, "text");
    assert_eq!(config.log_level, "info");
    Ok(())
}

#[test]
fn explicit_store_path_wins() {
    let config = parse(&["credgate", "--data-dir", "/var/lib/gate", "--store-path", "/tmp/t.json"]);
    assert_eq!(config.store_path(), PathBuf::from("/tmp/t.json"));
}

#[test]
fn data_dir_sets_store_location() {
    let config = parse(&["credgate", "--data-dir", "/var/lib/gate"]);
    assert_eq!(config.store_path(), PathBuf::from("/var/lib/gate/tokens.json"));
}

#[test]
fn blank_admin_secret_is_unset() {
    let config = parse(&["credgate", "--admin-secret", ""]);
    assert!(config.admin_secret().is_none());
    let config = parse(&["credgate", "--admin-secret", "s3cr3t"]);
    assert_eq!(config.admin_secret(), Some("s3cr3t"));
}

#[yare::parameterized(
    zero_capacity = { &["credgate", "--request-log-capacity", "0"], "request-log-capacity" },
    zero_interval = { &["credgate", "--refresh-interval-secs", "0"], "refresh-interval-secs" },
    bad_format    = { &["credgate", "--log-format", "yaml"], "invalid log format" },
    empty_upstream = { &["credgate", "--upstream-url", " "], "upstream-url" },
)]
fn invalid_config(args: &[&str], expected_substr: &str) {
    let config = parse(args);
    crate::assert_err_contains!(config.validate(), expected_substr);
}

#[test]
#[serial_test::serial]
fn env_overrides_defaults() {
    std::env::set_var("CREDGATE_PORT", "4100");
    std::env::set_var("CREDGATE_ADMIN_SECRET", "from-env");
    let config = parse(&["credgate"]);
    std::env::remove_var("CREDGATE_PORT");
    std::env::remove_var("CREDGATE_ADMIN_SECRET");

    assert_eq!(config.port, 4100);
    assert_eq!(config.admin_secret(), Some("from-env"));
}

#[test]
fn test_config_is_valid() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    GateConfig::test(dir.path()).validate()
}
