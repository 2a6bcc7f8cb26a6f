// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable token store: two ordered collections with an active pointer each.
//!
//! Invariants, held after every public call:
//! - an active id, when set, names a record of that kind;
//! - removing the active record moves the pointer to the first remaining
//!   record, or clears it;
//! - secrets are unique within a kind. A duplicate insert merges metadata
//!   into the existing record instead of adding one.
//!
//! Every mutation persists while the write lock is held, so file writes are
//! ordered and each one is atomic.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::credential::persist::{self, PersistedStore};
use crate::credential::seed::{SeedRecord, SeedSource};
use crate::credential::{MaskedRecord, TokenKind, TokenRecord};
use crate::error::{CredentialError, Result};

/// Masked view of the whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub factory_keys: Vec<MaskedRecord>,
    pub refresh_tokens: Vec<MaskedRecord>,
    pub active_factory_key_id: Option<String>,
    pub active_refresh_token_id: Option<String>,
}

/// Records of one kind, keyed by id in insertion order.
#[derive(Debug, Clone)]
struct Collection {
    kind: TokenKind,
    records: IndexMap<String, TokenRecord>,
    active: Option<String>,
}

impl Collection {
    fn new(kind: TokenKind) -> Self {
        Self { kind, records: IndexMap::new(), active: None }
    }

    /// Rebuild from persisted records, collapsing duplicate secrets and
    /// repairing a dangling active id.
    fn from_persisted(kind: TokenKind, records: Vec<TokenRecord>, active: Option<String>) -> Self {
        let mut collection = Self::new(kind);
        for mut record in records {
            record.kind = kind;
            record.secret = record.secret.trim().to_owned();
            if record.secret.is_empty() {
                warn!(kind = %kind, id = %record.id, "dropping persisted record with empty secret");
                continue;
            }
            if let Some(existing) = collection.find_by_secret_mut(&record.secret) {
                existing.read_only |= record.read_only;
                continue;
            }
            if record.id.is_empty() || collection.records.contains_key(&record.id) {
                record.id = uuid::Uuid::new_v4().to_string();
            }
            collection.records.insert(record.id.clone(), record);
        }
        collection.active = active.filter(|id| collection.records.contains_key(id));
        collection.repair_active();
        collection
    }

    fn find_by_secret_mut(&mut self, secret: &str) -> Option<&mut TokenRecord> {
        self.records.values_mut().find(|r| r.secret == secret)
    }

    fn first_id(&self) -> Option<String> {
        self.records.keys().next().cloned()
    }

    fn repair_active(&mut self) {
        let dangling = self.active.as_ref().is_some_and(|id| !self.records.contains_key(id));
        if dangling || self.active.is_none() {
            self.active = self.first_id();
        }
    }

    /// Insert a secret, or merge into the record that already holds it.
    ///
    /// A non-blank `label` replaces the existing label; `read_only` is
    /// OR-merged. Activates the record when nothing is active yet.
    fn upsert(&mut self, secret: &str, label: Option<&str>, read_only: bool) -> TokenRecord {
        let label = label.map(str::trim).filter(|l| !l.is_empty());
        let record = match self.find_by_secret_mut(secret) {
            Some(existing) => {
                existing.read_only |= read_only;
                if let Some(label) = label {
                    existing.label = label.to_owned();
                }
                existing.clone()
            }
            None => {
                let label = label.map(str::to_owned).unwrap_or_else(|| {
                    format!("{} {}", self.kind.display_name(), self.records.len() + 1)
                });
                let record = TokenRecord::new(self.kind, secret.to_owned(), label, read_only);
                self.records.insert(record.id.clone(), record.clone());
                record
            }
        };
        if self.active.is_none() {
            self.active = Some(record.id.clone());
        }
        record
    }

    fn get(&self, id: &str) -> Result<&TokenRecord> {
        self.records
            .get(id)
            .ok_or_else(|| CredentialError::NotFound { kind: self.kind, id: id.to_owned() })
    }

    fn remove(&mut self, id: &str) -> Result<TokenRecord> {
        if self.get(id)?.read_only {
            return Err(CredentialError::ImmutableRecord { kind: self.kind, id: id.to_owned() });
        }
        let removed = self
            .records
            .shift_remove(id)
            .ok_or_else(|| CredentialError::NotFound { kind: self.kind, id: id.to_owned() })?;
        if self.active.as_deref() == Some(id) {
            self.active = self.first_id();
        }
        Ok(removed)
    }

    fn activate(&mut self, id: &str) -> Result<TokenRecord> {
        let record = self.get(id)?.clone();
        self.active = Some(record.id.clone());
        Ok(record)
    }

    fn active_record(&self) -> Option<&TokenRecord> {
        self.active.as_ref().and_then(|id| self.records.get(id))
    }

    fn masked(&self) -> Vec<MaskedRecord> {
        self.records.values().map(TokenRecord::masked).collect()
    }
}

#[derive(Debug, Clone)]
struct StoreState {
    factory_keys: Collection,
    refresh_tokens: Collection,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            factory_keys: Collection::new(TokenKind::FactoryKey),
            refresh_tokens: Collection::new(TokenKind::RefreshToken),
        }
    }
}

impl StoreState {
    fn from_persisted(p: PersistedStore) -> Self {
        Self {
            factory_keys: Collection::from_persisted(
                TokenKind::FactoryKey,
                p.factory_keys,
                p.active_factory_key_id,
            ),
            refresh_tokens: Collection::from_persisted(
                TokenKind::RefreshToken,
                p.refresh_tokens,
                p.active_refresh_token_id,
            ),
        }
    }

    fn to_persisted(&self) -> PersistedStore {
        PersistedStore {
            factory_keys: self.factory_keys.records.values().cloned().collect(),
            refresh_tokens: self.refresh_tokens.records.values().cloned().collect(),
            active_factory_key_id: self.factory_keys.active.clone(),
            active_refresh_token_id: self.refresh_tokens.active.clone(),
        }
    }

    fn collection(&self, kind: TokenKind) -> &Collection {
        match kind {
            TokenKind::FactoryKey => &self.factory_keys,
            TokenKind::RefreshToken => &self.refresh_tokens,
        }
    }

    fn collection_mut(&mut self, kind: TokenKind) -> &mut Collection {
        match kind {
            TokenKind::FactoryKey => &mut self.factory_keys,
            TokenKind::RefreshToken => &mut self.refresh_tokens,
        }
    }

    fn merge(&mut self, source: SeedSource, records: &[SeedRecord], read_only: bool) -> usize {
        let mut merged = 0;
        for seed in records {
            let secret = seed.secret.trim();
            if secret.is_empty() {
                continue;
            }
            let record = self.collection_mut(seed.kind).upsert(secret, Some(&seed.label), read_only);
            debug!(source = %source, kind = %seed.kind, id = %record.id, "merged seed record");
            merged += 1;
        }
        merged
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            factory_keys: self.factory_keys.masked(),
            refresh_tokens: self.refresh_tokens.masked(),
            active_factory_key_id: self.factory_keys.active.clone(),
            active_refresh_token_id: self.refresh_tokens.active.clone(),
        }
    }
}

/// Operator-managed secrets with one active selection per kind.
pub struct TokenStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl TokenStore {
    /// Load from `path`, merge the startup seeds as read-only, and persist
    /// the merged result. Never fails: unreadable files start empty.
    pub fn open(path: impl Into<PathBuf>, seeds: &[SeedRecord]) -> Self {
        let store = Self { path: path.into(), state: RwLock::new(StoreState::default()) };
        {
            let mut state = store.state.write();
            *state = load_state(&store.path);
            merge_seeds(&mut state, seeds);
            store.persist(&state);
        }
        let snapshot = store.snapshot();
        info!(
            path = %store.path.display(),
            factory_keys = snapshot.factory_keys.len(),
            refresh_tokens = snapshot.refresh_tokens.len(),
            "token store ready"
        );
        store
    }

    /// Path of the persisted store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert records from an external source, deduplicating by secret.
    ///
    /// Does not persist; callers persist once after the merge pass.
    pub fn merge(&self, source: SeedSource, records: &[SeedRecord], read_only: bool) -> usize {
        self.state.write().merge(source, records, read_only)
    }

    /// Write the current state to disk.
    pub fn flush(&self) {
        let state = self.state.read();
        self.persist(&state);
    }

    /// Add a secret, or merge into the record that already holds it.
    pub fn add(&self, kind: TokenKind, secret: &str, label: Option<&str>) -> Result<MaskedRecord> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CredentialError::Validation("secret must not be empty".to_owned()));
        }
        let mut state = self.state.write();
        let record = state.collection_mut(kind).upsert(secret, label, false);
        self.persist(&state);
        info!(kind = %kind, id = %record.id, "token added");
        Ok(record.masked())
    }

    /// Remove a record. Read-only records are refused.
    pub fn remove(&self, kind: TokenKind, id: &str) -> Result<MaskedRecord> {
        let mut state = self.state.write();
        let removed = state.collection_mut(kind).remove(id)?;
        self.persist(&state);
        info!(kind = %kind, id, "token removed");
        Ok(removed.masked())
    }

    /// Make a record the active selection for its kind.
    pub fn activate(&self, kind: TokenKind, id: &str) -> Result<MaskedRecord> {
        let mut state = self.state.write();
        let record = state.collection_mut(kind).activate(id)?;
        self.persist(&state);
        info!(kind = %kind, id, "token activated");
        Ok(record.masked())
    }

    /// Replace the secret of a refresh-token record after provider rotation
    /// and re-activate it.
    ///
    /// Any other record already holding `new_secret` is folded into this one
    /// so secrets stay unique.
    pub fn rotate_secret(&self, id: &str, new_secret: &str) -> Result<TokenRecord> {
        let new_secret = new_secret.trim();
        if new_secret.is_empty() {
            return Err(CredentialError::Validation("rotated secret must not be empty".to_owned()));
        }
        let mut state = self.state.write();
        let collection = state.collection_mut(TokenKind::RefreshToken);
        collection.get(id)?;

        let duplicate = collection
            .records
            .values()
            .find(|r| r.id != id && r.secret == new_secret)
            .map(|r| (r.id.clone(), r.read_only));
        let mut inherited_read_only = false;
        if let Some((dup_id, dup_read_only)) = duplicate {
            collection.records.shift_remove(&dup_id);
            inherited_read_only = dup_read_only;
        }

        let record = match collection.records.get_mut(id) {
            Some(record) => {
                record.secret = new_secret.to_owned();
                record.read_only |= inherited_read_only;
                record.clone()
            }
            None => {
                return Err(CredentialError::NotFound {
                    kind: TokenKind::RefreshToken,
                    id: id.to_owned(),
                })
            }
        };
        collection.active = Some(record.id.clone());
        self.persist(&state);
        info!(id, "refresh token rotated by provider");
        Ok(record)
    }

    /// Re-read the file and re-merge the startup seeds.
    pub fn reload(&self, seeds: &[SeedRecord]) -> StoreSnapshot {
        let mut state = self.state.write();
        *state = load_state(&self.path);
        merge_seeds(&mut state, seeds);
        self.persist(&state);
        info!(path = %self.path.display(), "token store reloaded");
        state.snapshot()
    }

    /// Masked view of every record plus both active ids.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.read().snapshot()
    }

    /// Unmasked record lookup. Engine-internal only.
    pub fn value(&self, kind: TokenKind, id: &str) -> Option<TokenRecord> {
        self.state.read().collection(kind).records.get(id).cloned()
    }

    /// Unmasked active record of a kind.
    pub fn active(&self, kind: TokenKind) -> Option<TokenRecord> {
        self.state.read().collection(kind).active_record().cloned()
    }

    /// Number of records of a kind.
    pub fn count(&self, kind: TokenKind) -> usize {
        self.state.read().collection(kind).records.len()
    }

    fn persist(&self, state: &StoreState) {
        if let Err(e) = persist::save(&self.path, &state.to_persisted()) {
            warn!(path = %self.path.display(), "failed to persist token store: {e}");
        }
    }
}

fn load_state(path: &Path) -> StoreState {
    if !path.exists() {
        debug!(path = %path.display(), "no persisted token store");
        return StoreState::default();
    }
    match persist::load(path) {
        Ok(p) => StoreState::from_persisted(p),
        Err(e) => {
            warn!(path = %path.display(), "failed to load token store, starting empty: {e}");
            StoreState::default()
        }
    }
}

fn merge_seeds(state: &mut StoreState, seeds: &[SeedRecord]) {
    for source in [SeedSource::Environment, SeedSource::LegacyFile] {
        let batch: Vec<SeedRecord> = seeds.iter().filter(|s| s.source == source).cloned().collect();
        if !batch.is_empty() {
            state.merge(source, &batch, true);
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
