// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lifecycle: scope sets, records, persistence, and the broker.
//!
//! Each downstream capability (document read, drive metadata read, sheet
//! read) is a named [`ScopeSet`]. A scope set owns exactly one persisted
//! [`CredentialRecord`]; the [`broker::CredentialBroker`] keeps that record
//! valid and is its only writer.

pub mod broker;
pub mod consent;
pub mod flight;
pub mod oauth;
pub mod pkce;
pub mod store;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Scope set used for reading document bodies.
pub const DOCS: &str = "docs";
/// Scope set used for searching the drive file index.
pub const DRIVE: &str = "drive";
/// Scope set used for reading spreadsheet values.
pub const SHEETS: &str = "sheets";

const DOCS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/documents.readonly"];
const DRIVE_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive.metadata.readonly"];
const SHEETS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets.readonly"];

const MAX_ID_LEN: usize = 64;

/// Stable identifier of a scope set. Restricted to `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeSetId(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope set id {0:?}: expected 1-64 chars of [A-Za-z0-9_-]")]
pub struct InvalidScopeSetId(String);

impl ScopeSetId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidScopeSetId> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_ID_LEN
            && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(id))
        } else {
            Err(InvalidScopeSetId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ScopeSetId {
    type Error = InvalidScopeSetId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScopeSetId> for String {
    fn from(id: ScopeSetId) -> Self {
        id.0
    }
}

impl Borrow<str> for ScopeSetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, immutable bundle of OAuth scopes requested together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSet {
    id: ScopeSetId,
    scopes: Arc<[String]>,
}

impl ScopeSet {
    pub fn new(id: ScopeSetId, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut ordered: Vec<String> = Vec::new();
        for scope in scopes {
            let scope = scope.into();
            if !ordered.contains(&scope) {
                ordered.push(scope);
            }
        }
        Self { id, scopes: ordered.into() }
    }

    pub fn id(&self) -> &ScopeSetId {
        &self.id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Space-separated scope string as sent to the authorization server.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// One acquired grant for one scope set.
///
/// `raw` carries provider-specific response fields the broker does not
/// interpret (token type, id token, ...). Everything round-trips exactly
/// through the store.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub scope_set_id: ScopeSetId,
    pub access_token: String,
    /// Absolute expiry in epoch seconds. `None` means unknown and is never trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Scopes the upstream granted. Empty when the upstream did not say.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl CredentialRecord {
    /// True when the record expires strictly after `now + skew_secs`.
    pub fn is_valid_at(&self, now: u64, skew_secs: u64) -> bool {
        self.expires_at.is_some_and(|exp| exp > now.saturating_add(skew_secs))
    }

    /// True when this record was issued for `scope_set` and, if the upstream
    /// reported granted scopes, those cover everything the set asks for.
    pub fn satisfies(&self, scope_set: &ScopeSet) -> bool {
        if &self.scope_set_id != scope_set.id() {
            return false;
        }
        self.scopes.is_empty()
            || scope_set.scopes().iter().all(|wanted| self.scopes.contains(wanted))
    }

    /// Seconds of validity left at `now`, if the expiry is known and in the future.
    pub fn remaining_secs(&self, now: u64) -> Option<u64> {
        self.expires_at.and_then(|exp| exp.checked_sub(now)).filter(|left| *left > 0)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("scope_set_id", &self.scope_set_id)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Scope-set overrides loaded from `--scope-config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub scope_sets: Vec<ScopeSetConfig>,
}

/// Scope list for a single scope set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSetConfig {
    pub id: ScopeSetId,
    pub scopes: Vec<String>,
}

/// The scope sets known to this process. Built once at startup.
#[derive(Debug, Clone)]
pub struct ScopeRegistry {
    sets: BTreeMap<ScopeSetId, ScopeSet>,
}

impl ScopeRegistry {
    pub fn new(sets: impl IntoIterator<Item = ScopeSet>) -> Self {
        Self { sets: sets.into_iter().map(|s| (s.id().clone(), s)).collect() }
    }

    /// Read-only Google scopes for documents, drive metadata, and sheets.
    pub fn google_defaults() -> Self {
        let builtin = [(DOCS, DOCS_SCOPES), (DRIVE, DRIVE_SCOPES), (SHEETS, SHEETS_SCOPES)];
        Self::new(
            builtin
                .into_iter()
                .map(|(id, scopes)| ScopeSet::new(ScopeSetId(id.to_owned()), scopes.iter().copied())),
        )
    }

    /// Replace or add scope sets from a config file.
    pub fn with_overrides(mut self, config: ScopeConfig) -> anyhow::Result<Self> {
        for entry in config.scope_sets {
            if entry.scopes.is_empty() {
                anyhow::bail!("scope set {} has no scopes", entry.id);
            }
            let set = ScopeSet::new(entry.id.clone(), entry.scopes);
            self.sets.insert(entry.id, set);
        }
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&ScopeSet> {
        self.sets.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScopeSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Resolve the state directory for persisted credentials.
///
/// Checks `DOCGATE_STATE_DIR`, then `$XDG_STATE_HOME/docgate`,
/// then `$HOME/.local/state/docgate`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCGATE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("docgate");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/docgate");
    }
    PathBuf::from(".docgate")
}

pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
