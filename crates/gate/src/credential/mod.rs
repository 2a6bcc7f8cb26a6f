// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential records: the operator-managed secrets the gateway can present
//! upstream in place of a caller's own credential.
//!
//! Two kinds exist. Factory keys are fixed API keys used verbatim. Refresh
//! tokens are exchanged for short-lived access tokens by the
//! [`refresh::RefreshEngine`]. Both live in the [`store::TokenStore`], which
//! keeps one active selection per kind.

pub mod oauth;
pub mod persist;
pub mod refresh;
pub mod seed;
pub mod store;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the persisted token store inside the data directory.
pub const STORE_FILE: &str = "tokens.json";

/// Secrets at or below this many characters are shown unmasked.
pub const MASK_THRESHOLD: usize = 8;

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    FactoryKey,
    RefreshToken,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::FactoryKey, TokenKind::RefreshToken];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FactoryKey => "factory_key",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Human-facing name, used for default labels.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FactoryKey => "Factory key",
            Self::RefreshToken => "Refresh token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "factory_key" | "factory" => Ok(Self::FactoryKey),
            "refresh_token" | "refresh" => Ok(Self::RefreshToken),
            other => anyhow::bail!("invalid token kind: {other}"),
        }
    }
}

/// A single operator-supplied secret.
///
/// `read_only` records come from the environment or the legacy credential
/// file. They can be deactivated but never deleted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Empty or duplicate ids are regenerated on load.
    #[serde(default)]
    pub id: String,
    /// On load the owning collection overrides whatever was persisted.
    #[serde(default)]
    pub kind: TokenKind,
    #[serde(default)]
    pub label: String,
    /// Records with an empty secret are dropped on load.
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub read_only: bool,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: u64,
}

impl TokenRecord {
    pub fn new(kind: TokenKind, secret: String, label: String, read_only: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            label,
            secret,
            read_only,
            created_at: epoch_ms(),
        }
    }

    /// Copy of this record safe to hand across the engine boundary.
    pub fn masked(&self) -> MaskedRecord {
        MaskedRecord {
            id: self.id.clone(),
            kind: self.kind,
            label: self.label.clone(),
            secret: mask_secret(&self.secret),
            read_only: self.read_only,
            created_at: self.created_at,
        }
    }
}

// Hand-written so secrets never reach logs through `{:?}`.
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("secret", &mask_secret(&self.secret))
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// A [`TokenRecord`] with its secret masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedRecord {
    pub id: String,
    pub kind: TokenKind,
    pub label: String,
    pub secret: String,
    pub read_only: bool,
    pub created_at: u64,
}

/// Mask a secret as `first4...last4`.
///
/// Secrets of [`MASK_THRESHOLD`] characters or fewer are returned as-is.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= MASK_THRESHOLD {
        return secret.to_owned();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Default store location for a data directory.
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
