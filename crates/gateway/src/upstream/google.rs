// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Google OAuth2, Docs, Drive, and Sheets clients.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::credential::consent::ConsentFlow;
use crate::credential::oauth::{OAuthErrorBody, TokenResponse};
use crate::credential::pkce::{self, AuthRequest};
use crate::credential::{epoch_secs, CredentialRecord, ScopeSet};
use crate::upstream::secrets::ClientSecrets;
use crate::upstream::{Authorizer, DocumentPayload, FileRef, ResourceApi, UpstreamError};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DOCS_BASE: &str = "https://docs.googleapis.com";
const DRIVE_BASE: &str = "https://www.googleapis.com";
const SHEETS_BASE: &str = "https://sheets.googleapis.com";

/// Drive search page size. Only the first match is used, the rest keep the
/// upstream order visible in logs.
const SEARCH_PAGE_SIZE: &str = "10";

/// Base URLs for every Google endpoint the gateway calls.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub docs_base: String,
    pub drive_base: String,
    pub sheets_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: AUTH_ENDPOINT.to_owned(),
            token_url: TOKEN_ENDPOINT.to_owned(),
            docs_base: DOCS_BASE.to_owned(),
            drive_base: DRIVE_BASE.to_owned(),
            sheets_base: SHEETS_BASE.to_owned(),
        }
    }
}

impl GoogleEndpoints {
    /// Take the authorization and token endpoints from the client secrets, when present.
    pub fn with_secrets(mut self, secrets: &ClientSecrets) -> Self {
        if let Some(ref uri) = secrets.auth_uri {
            self.auth_url = uri.clone();
        }
        if let Some(ref uri) = secrets.token_uri {
            self.token_url = uri.clone();
        }
        self
    }
}

// -- Authorization server -----------------------------------------------------

/// Authorization code + PKCE and refresh grants against Google's token endpoint.
pub struct GoogleAuthorizer {
    http: reqwest::Client,
    secrets: ClientSecrets,
    endpoints: GoogleEndpoints,
    consent: Arc<ConsentFlow>,
}

impl GoogleAuthorizer {
    pub fn new(
        http: reqwest::Client,
        secrets: ClientSecrets,
        endpoints: GoogleEndpoints,
        consent: Arc<ConsentFlow>,
    ) -> Self {
        Self { http, secrets, endpoints, consent }
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, UpstreamError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("token request failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<TokenResponse>().await.map_err(|e| {
                UpstreamError::Rejected(format!("malformed token response: {e}"))
            });
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify_token_error(status, &body))
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn exchange_authorization_code(
        &self,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError> {
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::compute_code_challenge(&code_verifier);
        let scope = scope_set.scope_param();
        let redirect_uri = self.consent.redirect_uri().to_owned();

        let code = self
            .consent
            .await_code(scope_set.id(), |state| {
                pkce::build_auth_url(&AuthRequest {
                    auth_url: &self.endpoints.auth_url,
                    client_id: &self.secrets.client_id,
                    redirect_uri: &redirect_uri,
                    scope: &scope,
                    code_challenge: &code_challenge,
                    state,
                })
            })
            .await
            .map_err(|e| UpstreamError::Consent(e.to_string()))?;

        tracing::info!(scope_set = %scope_set.id(), "exchanging authorization code");
        let issued_at = epoch_secs();
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.secrets.client_id.as_str()),
            ("code", code.as_str()),
            ("code_verifier", code_verifier.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        if let Some(ref secret) = self.secrets.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        let token = self.post_token(&form).await?;
        Ok(token.into_record(scope_set.id().clone(), issued_at))
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError> {
        tracing::debug!(scope_set = %scope_set.id(), "refreshing access token");
        let issued_at = epoch_secs();
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.secrets.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];
        if let Some(ref secret) = self.secrets.client_secret {
            form.push(("client_secret", secret.as_str()));
        }
        let token = self.post_token(&form).await?;
        Ok(token.into_record(scope_set.id().clone(), issued_at))
    }
}

/// Map a non-2xx token endpoint answer onto the broker's failure classes.
pub(crate) fn classify_token_error(status: StatusCode, body: &str) -> UpstreamError {
    if status.is_server_error() {
        return UpstreamError::Unavailable(format!("token endpoint returned {status}"));
    }
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(err) if err.is_revocation() => UpstreamError::Revoked(err.to_string()),
        Ok(err) => UpstreamError::Rejected(err.to_string()),
        Err(_) => UpstreamError::Rejected(format!("token endpoint returned {status}: {body}")),
    }
}

// -- Resource APIs ------------------------------------------------------------

#[derive(Deserialize)]
struct DocumentResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<DocumentBody>,
}

#[derive(Deserialize)]
struct DocumentBody {
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Docs v1, Drive v3, and Sheets v4 calls.
pub struct GoogleApi {
    http: reqwest::Client,
    endpoints: GoogleEndpoints,
}

impl GoogleApi {
    pub fn new(http: reqwest::Client, endpoints: GoogleEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        credential: &CredentialRecord,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }
        resp.json::<T>()
            .await
            .map_err(|e| UpstreamError::Rejected(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl ResourceApi for GoogleApi {
    async fn get_document(
        &self,
        credential: &CredentialRecord,
        document_id: &str,
    ) -> Result<DocumentPayload, UpstreamError> {
        let url = endpoint(&self.endpoints.docs_base, &["v1", "documents", document_id])?;
        let doc: DocumentResponse = self.get_json(credential, url, &[]).await?;
        Ok(DocumentPayload {
            title: doc.title,
            content: doc.body.map(|b| b.content).unwrap_or(serde_json::Value::Null),
        })
    }

    async fn search_files_by_name(
        &self,
        credential: &CredentialRecord,
        name: &str,
    ) -> Result<Vec<FileRef>, UpstreamError> {
        let url = endpoint(&self.endpoints.drive_base, &["drive", "v3", "files"])?;
        let q = exact_name_query(name);
        let list: FileList = self
            .get_json(
                credential,
                url,
                &[
                    ("q", q.as_str()),
                    ("spaces", "drive"),
                    ("fields", "files(id, name)"),
                    ("pageSize", SEARCH_PAGE_SIZE),
                ],
            )
            .await?;
        Ok(list.files)
    }

    async fn read_sheet(
        &self,
        credential: &CredentialRecord,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<Vec<Vec<String>>, UpstreamError> {
        let title = match sheet {
            Some(name) => name.to_owned(),
            None => {
                let url = endpoint(&self.endpoints.sheets_base, &["v4", "spreadsheets", spreadsheet_id])?;
                let meta: SpreadsheetMeta = self
                    .get_json(credential, url, &[("fields", "sheets.properties.title")])
                    .await?;
                meta.sheets
                    .into_iter()
                    .next()
                    .map(|s| s.properties.title)
                    .ok_or_else(|| UpstreamError::Rejected("spreadsheet has no sheets".to_owned()))?
            }
        };

        let range = quote_sheet_range(&title);
        let url = endpoint(
            &self.endpoints.sheets_base,
            &["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()],
        )?;
        let values: ValueRange = self.get_json(credential, url, &[]).await?;
        Ok(values
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

/// Build `base/seg/seg/...`, percent-encoding each segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, UpstreamError> {
    let mut url = Url::parse(base)
        .map_err(|e| UpstreamError::Rejected(format!("invalid endpoint {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Rejected(format!("endpoint {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Drive `q` expression matching a file name exactly.
pub(crate) fn exact_name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}'")
}

/// A1 range selecting a whole sheet by title.
pub(crate) fn quote_sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map a non-2xx resource API answer, keeping Google's own message.
pub(crate) fn classify_api_error(status: StatusCode, body: &str) -> UpstreamError {
    let detail = serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_owned());
    let message = if detail.is_empty() {
        format!("upstream returned {status}")
    } else {
        format!("upstream returned {status}: {detail}")
    };
    if status.is_server_error() {
        UpstreamError::Unavailable(message)
    } else {
        UpstreamError::Rejected(message)
    }
}

#[cfg(test)]
#[path = "google_tests.rs"]
mod tests;
