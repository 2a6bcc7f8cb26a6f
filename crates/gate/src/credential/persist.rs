// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token store persistence: load/save to JSON file with atomic writes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::credential::TokenRecord;

/// On-disk form of the token store.
///
/// Unknown fields are ignored so older binaries can read newer files.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStore {
    #[serde(default)]
    pub factory_keys: Vec<TokenRecord>,
    #[serde(default)]
    pub refresh_tokens: Vec<TokenRecord>,
    #[serde(default)]
    pub active_factory_key_id: Option<String>,
    #[serde(default)]
    pub active_refresh_token_id: Option<String>,
}

/// Load the persisted store from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<PersistedStore> {
    let contents = std::fs::read_to_string(path)?;
    let store: PersistedStore = serde_json::from_str(&contents)?;
    Ok(store)
}

/// Save the store to a JSON file atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// share a `.tmp` file; a shorter write could otherwise leave trailing bytes
/// from a longer previous write.
pub fn save(path: &Path, store: &PersistedStore) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(store)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
