// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only seed records from the process environment and the legacy
//! credential file.
//!
//! Seeds are collected exactly once at startup and merged into the
//! [`TokenStore`](crate::credential::store::TokenStore). The environment is
//! never written back to.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::credential::TokenKind;

/// Environment variable holding a fixed factory API key.
pub const FACTORY_KEY_ENV: &str = "FACTORY_API_KEY";

/// Environment variable holding an OAuth refresh token.
pub const REFRESH_TOKEN_ENV: &str = "DROID_REFRESH_KEY";

/// Label given to records read from the legacy credential file.
pub const LEGACY_LABEL: &str = "Legacy (auth.json)";

/// Where a seed record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    Environment,
    LegacyFile,
}

impl fmt::Display for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::LegacyFile => f.write_str("legacy_file"),
        }
    }
}

/// A secret to merge into the store as read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub source: SeedSource,
    pub kind: TokenKind,
    pub secret: String,
    pub label: String,
}

impl fmt::Debug for SeedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedRecord")
            .field("source", &self.source)
            .field("kind", &self.kind)
            .field("secret", &crate::credential::mask_secret(&self.secret))
            .field("label", &self.label)
            .finish()
    }
}

/// Default legacy credential file: `$HOME/.factory/auth.json`.
pub fn default_legacy_auth_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".factory/auth.json"))
}

/// Collect seeds from the real process environment and the legacy file.
pub fn collect(legacy_path: Option<&Path>) -> Vec<SeedRecord> {
    let mut seeds = from_env(|name| std::env::var(name).ok());
    if let Some(path) = legacy_path {
        seeds.extend(from_legacy_file(path));
    }
    info!(count = seeds.len(), "collected credential seeds");
    seeds
}

/// Build seeds from an environment lookup. Blank values are ignored.
pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Vec<SeedRecord> {
    [(FACTORY_KEY_ENV, TokenKind::FactoryKey), (REFRESH_TOKEN_ENV, TokenKind::RefreshToken)]
        .into_iter()
        .filter_map(|(name, kind)| {
            let value = lookup(name)?;
            let secret = value.trim();
            if secret.is_empty() {
                return None;
            }
            Some(SeedRecord {
                source: SeedSource::Environment,
                kind,
                secret: secret.to_owned(),
                label: format!("Environment ({name})"),
            })
        })
        .collect()
}

/// Read seeds from the legacy credential file.
///
/// A missing file yields nothing. Unreadable or malformed files are logged
/// and skipped so startup never fails on them.
pub fn from_legacy_file(path: &Path) -> Vec<SeedRecord> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no legacy credential file");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %path.display(), "failed to read legacy credential file: {e}");
            return Vec::new();
        }
    };

    match parse_legacy_auth(&data) {
        Ok(seeds) => {
            info!(path = %path.display(), count = seeds.len(), "loaded legacy credentials");
            seeds
        }
        Err(e) => {
            warn!(path = %path.display(), "failed to parse legacy credential file: {e}");
            Vec::new()
        }
    }
}

/// Parse the legacy `auth.json` format.
///
/// `access_token` becomes a factory key and `refresh_token` a refresh token.
/// Either may be absent or empty.
pub fn parse_legacy_auth(json: &str) -> anyhow::Result<Vec<SeedRecord>> {
    let root: serde_json::Value =
        serde_json::from_str(json).map_err(|e| anyhow::anyhow!("invalid JSON: {e}"))?;
    if !root.is_object() {
        anyhow::bail!("expected a JSON object");
    }

    let field = |name: &str| {
        root.get(name).and_then(|v| v.as_str()).map(str::trim).filter(|s| !s.is_empty())
    };

    let mut seeds = Vec::new();
    if let Some(token) = field("access_token") {
        seeds.push(SeedRecord {
            source: SeedSource::LegacyFile,
            kind: TokenKind::FactoryKey,
            secret: token.to_owned(),
            label: LEGACY_LABEL.to_owned(),
        });
    }
    if let Some(token) = field("refresh_token") {
        seeds.push(SeedRecord {
            source: SeedSource::LegacyFile,
            kind: TokenKind::RefreshToken,
            secret: token.to_owned(),
            label: LEGACY_LABEL.to_owned(),
        });
    }
    Ok(seeds)
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod tests;
