// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 token endpoint wire types.

use serde::{Deserialize, Serialize};

use crate::credential::{CredentialRecord, ScopeSetId};

/// Standard OAuth2 token response (RFC 6749 §5.1).
///
/// Fields the broker does not model (`token_type`, `id_token`, ...) are kept
/// in `extra` and end up in [`CredentialRecord::raw`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenResponse {
    /// Build a record for `scope_set_id`, anchoring `expires_in` at `issued_at`.
    pub fn into_record(self, scope_set_id: ScopeSetId, issued_at: u64) -> CredentialRecord {
        let scopes = self
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        CredentialRecord {
            scope_set_id,
            access_token: self.access_token,
            expires_at: self.expires_in.map(|secs| issued_at.saturating_add(secs)),
            refresh_token: self.refresh_token,
            scopes,
            raw: self.extra,
        }
    }
}

/// Standard OAuth2 error response (RFC 6749 §5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorBody {
    /// The grant was revoked or expired at the authorization server.
    pub fn is_revocation(&self) -> bool {
        self.error == "invalid_grant"
    }
}

impl std::fmt::Display for OAuthErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => f.write_str(&self.error),
        }
    }
}

#[cfg(test)]
#[path = "oauth_tests.rs"]
mod tests;
