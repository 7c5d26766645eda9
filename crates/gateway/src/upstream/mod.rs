// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capabilities the gateway consumes from the upstream provider.
//!
//! [`Authorizer`] talks to the authorization server; [`ResourceApi`] talks
//! to the document, drive, and sheets APIs with a credential the broker
//! already validated.

pub mod google;
pub mod secrets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credential::{CredentialRecord, ScopeSet};

/// Failure talking to the upstream provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Transport failure or a 5xx answer.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    /// The authorization server reports the grant as revoked or expired.
    #[error("grant revoked: {0}")]
    Revoked(String),
    /// The interactive consent step did not produce an authorization code.
    #[error("{0}")]
    Consent(String),
    /// Any other rejection. Carries the upstream's own message.
    #[error("{0}")]
    Rejected(String),
}

/// Obtains credentials from the authorization server.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Run the interactive authorization code flow for `scope_set`.
    ///
    /// May suspend for as long as the human consent step takes.
    async fn exchange_authorization_code(
        &self,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError>;

    /// Redeem `refresh_token` for a new access token.
    ///
    /// The returned record has `refresh_token: None` unless the server
    /// rotated it.
    async fn refresh(
        &self,
        refresh_token: &str,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError>;
}

/// Title and structural body content of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub title: String,
    pub content: serde_json::Value,
}

/// A file in the drive index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
}

/// Read-only resource calls made with a valid bearer credential.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn get_document(
        &self,
        credential: &CredentialRecord,
        document_id: &str,
    ) -> Result<DocumentPayload, UpstreamError>;

    /// Files whose name equals `name` exactly, in upstream order.
    async fn search_files_by_name(
        &self,
        credential: &CredentialRecord,
        name: &str,
    ) -> Result<Vec<FileRef>, UpstreamError>;

    /// Cell values of one sheet, row-major. `sheet: None` reads the first sheet.
    async fn read_sheet(
        &self,
        credential: &CredentialRecord,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<Vec<Vec<String>>, UpstreamError>;
}
