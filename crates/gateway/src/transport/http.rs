// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the read API and credential status.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::credential::broker::ScopeSetStatus;
use crate::credential::consent::PendingConsent;
use crate::credential::ScopeSetId;
use crate::gateway::GatewayError;
use crate::state::GatewayState;

const WELCOME: &str = "Welcome to the Google Docs and Drive API gateway! \
    Use /api/data?docId=YOUR_DOCUMENT_ID to fetch document content, \
    /api/search?fileName=YOUR_FILE_NAME to search for a document ID, \
    or /api/sheet?spreadsheetId=YOUR_SPREADSHEET_ID to read a sheet.";

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub scope_sets: Vec<ScopeSetId>,
}

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    #[serde(rename = "docId", default)]
    pub doc_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "fileName", default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "fileId")]
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SheetQuery {
    #[serde(rename = "spreadsheetId", default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub scope_sets: Vec<ScopeSetStatus>,
    pub pending: Vec<PendingConsent>,
}

fn error_response(err: GatewayError) -> axum::response::Response {
    if let GatewayError::Credential(ref e) = err {
        tracing::error!(err = %e, "credential unavailable");
    }
    err.to_http_response().into_response()
}

// -- Handlers -----------------------------------------------------------------

/// `GET /`
pub async fn index() -> &'static str {
    WELCOME
}

/// `GET /api/health`
pub async fn health(State(s): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        scope_sets: s.scopes.iter().map(|set| set.id().clone()).collect(),
    })
}

/// `GET /api/data?docId=`: document title and structural content.
pub async fn fetch_document(
    State(s): State<Arc<GatewayState>>,
    Query(q): Query<DataQuery>,
) -> impl IntoResponse {
    match s.gateway.fetch_document(q.doc_id.as_deref().unwrap_or_default()).await {
        Ok(doc) => Json(doc).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /api/search?fileName=`: id of the first file with exactly that name.
pub async fn search_file(
    State(s): State<Arc<GatewayState>>,
    Query(q): Query<SearchQuery>,
) -> impl IntoResponse {
    let name = q.file_name.unwrap_or_default();
    match s.gateway.find_file_by_exact_name(&name).await {
        Ok(file) => Json(SearchResponse { file_name: name, file_id: file.id }).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /api/sheet?spreadsheetId=[&sheet=]`: sheet rows keyed by header.
pub async fn read_sheet(
    State(s): State<Arc<GatewayState>>,
    Query(q): Query<SheetQuery>,
) -> impl IntoResponse {
    let sheet = q.sheet.as_deref().filter(|name| !name.is_empty());
    match s.gateway.read_sheet(q.spreadsheet_id.as_deref().unwrap_or_default(), sheet).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

/// `GET /api/credentials`: per scope set lifecycle state and pending consent URLs.
pub async fn credentials_status(State(s): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(CredentialsResponse {
        scope_sets: s.broker.status(s.scopes.iter()).await,
        pending: s.consent.pending(),
    })
}
