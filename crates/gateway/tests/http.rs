// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the gateway HTTP API.
//!
//! Uses `axum_test::TestServer` with fake upstreams; no network needed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use parking_lot::Mutex;
use serde_json::{json, Value};

use docgate::config::GatewayConfig;
use docgate::credential::broker::CredentialBroker;
use docgate::credential::consent::ConsentFlow;
use docgate::credential::store::{CredentialStore, FileCredentialStore};
use docgate::credential::{epoch_secs, CredentialRecord, ScopeRegistry, ScopeSet, DOCS, DRIVE, SHEETS};
use docgate::gateway::ApiGateway;
use docgate::state::GatewayState;
use docgate::transport::build_router;
use docgate::upstream::{Authorizer, DocumentPayload, FileRef, ResourceApi, UpstreamError};

fn test_config(auth_token: Option<&str>, state_dir: PathBuf) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        auth_token: auth_token.map(str::to_owned),
        state_dir: Some(state_dir),
        client_secrets: PathBuf::from("credentials.json"),
        public_url: None,
        expiry_skew_secs: 10,
        consent_timeout_secs: 300,
        http_timeout_secs: 30,
        scope_config: None,
        log_level: "info".into(),
        log_format: "text".into(),
    }
}

/// Runs the interactive flow against the real `ConsentFlow` and mints a token
/// from whatever code the callback delivers.
struct ConsentAuthorizer {
    consent: Arc<ConsentFlow>,
}

#[async_trait]
impl Authorizer for ConsentAuthorizer {
    async fn exchange_authorization_code(
        &self,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError> {
        let code = self
            .consent
            .await_code(scope_set.id(), |state| format!("https://auth.test/authorize?state={state}"))
            .await
            .map_err(|e| UpstreamError::Consent(e.to_string()))?;
        Ok(CredentialRecord {
            scope_set_id: scope_set.id().clone(),
            access_token: format!("token-for-{code}"),
            expires_at: Some(epoch_secs() + 3600),
            refresh_token: Some("rt".to_owned()),
            scopes: Vec::new(),
            raw: serde_json::Map::new(),
        })
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, UpstreamError> {
        Err(UpstreamError::Revoked("invalid_grant".to_owned()))
    }
}

#[derive(Default)]
struct FakeApi {
    calls: AtomicU32,
    tokens_seen: Mutex<Vec<String>>,
    files: Mutex<Vec<FileRef>>,
    rows: Mutex<Vec<Vec<String>>>,
    failure: Mutex<Option<UpstreamError>>,
}

impl FakeApi {
    fn record_call(&self, credential: &CredentialRecord) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_seen.lock().push(credential.access_token.clone());
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn get_document(
        &self,
        credential: &CredentialRecord,
        document_id: &str,
    ) -> Result<DocumentPayload, UpstreamError> {
        self.record_call(credential)?;
        Ok(DocumentPayload {
            title: format!("Doc {document_id}"),
            content: json!([{"paragraph": {"elements": [{"textRun": {"content": "hello\n"}}]}}]),
        })
    }

    async fn search_files_by_name(
        &self,
        credential: &CredentialRecord,
        _name: &str,
    ) -> Result<Vec<FileRef>, UpstreamError> {
        self.record_call(credential)?;
        Ok(self.files.lock().clone())
    }

    async fn read_sheet(
        &self,
        credential: &CredentialRecord,
        _spreadsheet_id: &str,
        _sheet: Option<&str>,
    ) -> Result<Vec<Vec<String>>, UpstreamError> {
        self.record_call(credential)?;
        Ok(self.rows.lock().clone())
    }
}

struct Harness {
    server: TestServer,
    api: Arc<FakeApi>,
    consent: Arc<ConsentFlow>,
    store: Arc<FileCredentialStore>,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Persist a valid credential so requests skip the interactive flow.
    fn seed(&self, id: &str) -> anyhow::Result<()> {
        let scopes = ScopeRegistry::google_defaults();
        let set = scopes.get(id).ok_or_else(|| anyhow::anyhow!("unknown scope set {id}"))?;
        let record = CredentialRecord {
            scope_set_id: set.id().clone(),
            access_token: format!("{id}-seeded"),
            expires_at: Some(epoch_secs() + 3600),
            refresh_token: Some("rt".to_owned()),
            scopes: set.scopes().to_vec(),
            raw: serde_json::Map::new(),
        };
        self.store.save(set.id(), &record)?;
        Ok(())
    }

    fn seed_all(&self) -> anyhow::Result<()> {
        for id in [DOCS, DRIVE, SHEETS] {
            self.seed(id)?;
        }
        Ok(())
    }

    /// `state` of the oldest pending consent, once one is registered.
    async fn pending_state(&self) -> anyhow::Result<String> {
        for _ in 0..400 {
            if let Some(pending) = self.consent.pending().into_iter().next() {
                let state = pending.auth_url.rsplit_once("state=").map(|(_, s)| s.to_owned());
                return state.ok_or_else(|| anyhow::anyhow!("no state in {}", pending.auth_url));
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        anyhow::bail!("no consent flow started")
    }
}

fn harness(auth_token: Option<&str>, consent_timeout: Duration) -> anyhow::Result<Harness> {
    let dir = tempfile::tempdir()?;
    let config = test_config(auth_token, dir.path().to_path_buf());
    let scopes = ScopeRegistry::google_defaults();

    let store = Arc::new(FileCredentialStore::open(config.credentials_dir())?);
    let consent = Arc::new(ConsentFlow::new(config.redirect_uri(), consent_timeout));
    let authorizer = Arc::new(ConsentAuthorizer { consent: Arc::clone(&consent) });
    let api = Arc::new(FakeApi::default());

    let broker = CredentialBroker::new(
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        authorizer as Arc<dyn Authorizer>,
        config.expiry_skew_secs,
    );
    let gateway = ApiGateway::new(Arc::clone(&broker), Arc::clone(&api) as Arc<dyn ResourceApi>, &scopes)?;
    let state = GatewayState::new(config, gateway, broker, Arc::clone(&consent), scopes);
    let server = TestServer::new(build_router(Arc::new(state)))?;

    Ok(Harness { server, api, consent, store, _dir: dir })
}

fn default_harness() -> anyhow::Result<Harness> {
    harness(None, Duration::from_secs(5))
}

#[tokio::test]
async fn index_lists_routes() -> anyhow::Result<()> {
    let h = default_harness()?;

    let resp = h.server.get("/").await;

    resp.assert_status_ok();
    let text = resp.text();
    assert!(text.contains("/api/data?docId=YOUR_DOCUMENT_ID"));
    assert!(text.contains("/api/search?fileName=YOUR_FILE_NAME"));
    Ok(())
}

#[tokio::test]
async fn health_lists_scope_sets() -> anyhow::Result<()> {
    let h = default_harness()?;

    let resp = h.server.get("/api/health").await;

    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!({"status": "running", "scope_sets": ["docs", "drive", "sheets"]}));
    Ok(())
}

#[tokio::test]
async fn data_returns_title_and_content() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed_all()?;

    let resp = h.server.get("/api/data").add_query_param("docId", "doc-1").await;

    resp.assert_status_ok();
    let body = resp.json::<Value>();
    assert_eq!(body["title"], "Doc doc-1");
    assert!(body["content"].is_array());
    assert_eq!(*h.api.tokens_seen.lock(), vec!["docs-seeded".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn data_without_doc_id_is_bad_request() -> anyhow::Result<()> {
    let h = default_harness()?;

    let resp = h.server.get("/api/data").await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.json::<Value>(),
        json!({
            "error": "No document id provided. Please add ?docId=YOUR_DOCUMENT_ID to the URL.",
            "code": "BAD_REQUEST",
        })
    );
    assert_eq!(h.api.calls.load(Ordering::SeqCst), 0);
    assert!(h.consent.pending().is_empty());
    Ok(())
}

#[tokio::test]
async fn search_returns_first_match() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed_all()?;
    *h.api.files.lock() = vec![
        FileRef { id: "A".to_owned(), name: "test.doc".to_owned() },
        FileRef { id: "B".to_owned(), name: "test.doc".to_owned() },
    ];

    let resp = h.server.get("/api/search").add_query_param("fileName", "test.doc").await;

    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!({"fileName": "test.doc", "fileId": "A"}));
    Ok(())
}

#[tokio::test]
async fn search_without_match_is_not_found() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed_all()?;

    let resp = h.server.get("/api/search").add_query_param("fileName", "nothing.doc").await;

    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        resp.json::<Value>(),
        json!({"error": "No file found with name: nothing.doc", "code": "NOT_FOUND"})
    );
    Ok(())
}

#[tokio::test]
async fn search_without_file_name_is_bad_request() -> anyhow::Result<()> {
    let h = default_harness()?;

    let resp = h.server.get("/api/search").add_query_param("fileName", "").await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(h.api.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn sheet_rows_become_records() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed_all()?;
    *h.api.rows.lock() = vec![
        vec!["name".to_owned(), "team".to_owned()],
        vec!["ada".to_owned(), "".to_owned()],
        vec!["".to_owned(), "".to_owned()],
    ];

    let resp = h.server.get("/api/sheet").add_query_param("spreadsheetId", "sheet-1").await;

    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>(), json!([{"name": "ada", "team": null}]));
    Ok(())
}

#[tokio::test]
async fn upstream_failure_passes_message_through() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed_all()?;
    *h.api.failure.lock() =
        Some(UpstreamError::Rejected("upstream returned 404 Not Found: Requested entity was not found.".to_owned()));

    let resp = h.server.get("/api/data").add_query_param("docId", "missing").await;

    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.json::<Value>();
    assert_eq!(body["code"], "UPSTREAM_ERROR");
    assert_eq!(body["error"], "upstream returned 404 Not Found: Requested entity was not found.");
    Ok(())
}

#[tokio::test]
async fn credential_failure_is_opaque_server_error() -> anyhow::Result<()> {
    let h = harness(None, Duration::from_millis(50))?;

    let resp = h.server.get("/api/data").add_query_param("docId", "doc-1").await;

    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body = resp.json::<Value>();
    assert_eq!(body["code"], "CREDENTIAL_UNAVAILABLE");
    assert!(!body["error"].as_str().unwrap_or_default().contains("consent"));
    assert_eq!(h.api.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn callback_completes_the_pending_authorization() -> anyhow::Result<()> {
    let h = default_harness()?;

    let request = async { h.server.get("/api/data").add_query_param("docId", "doc-1").await };
    let approve = async {
        let state = h.pending_state().await?;
        let page = h
            .server
            .get("/oauth/callback")
            .add_query_param("code", "abc")
            .add_query_param("state", &state)
            .await;
        anyhow::Ok(page)
    };
    let (resp, page) = tokio::join!(request, approve);
    let page = page?;

    page.assert_status_ok();
    assert!(page.text().contains("Access granted for docs"));
    resp.assert_status_ok();
    assert_eq!(*h.api.tokens_seen.lock(), vec!["token-for-abc".to_owned()]);

    // Persisted: the next request needs no consent.
    let again = h.server.get("/api/data").add_query_param("docId", "doc-2").await;
    again.assert_status_ok();
    assert!(h.consent.pending().is_empty());
    let stored = h.store.load(&docgate::credential::ScopeSetId::new(DOCS)?)?;
    assert_eq!(stored.map(|r| r.access_token).as_deref(), Some("token-for-abc"));
    Ok(())
}

#[tokio::test]
async fn callback_reports_denied_consent() -> anyhow::Result<()> {
    let h = default_harness()?;

    let request = async { h.server.get("/api/data").add_query_param("docId", "doc-1").await };
    let deny = async {
        let state = h.pending_state().await?;
        let page = h
            .server
            .get("/oauth/callback")
            .add_query_param("error", "access_denied")
            .add_query_param("state", &state)
            .await;
        anyhow::Ok(page)
    };
    let (resp, page) = tokio::join!(request, deny);

    page?.assert_status_ok();
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.api.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() -> anyhow::Result<()> {
    let h = default_harness()?;

    let resp = h
        .server
        .get("/oauth/callback")
        .add_query_param("code", "abc")
        .add_query_param("state", "forged")
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    assert!(resp.text().contains("Unknown or expired"));
    Ok(())
}

#[tokio::test]
async fn credentials_status_reports_scope_sets() -> anyhow::Result<()> {
    let h = default_harness()?;
    h.seed(DOCS)?;

    let resp = h.server.get("/api/credentials").await;

    resp.assert_status_ok();
    let body = resp.json::<Value>();
    let states: Vec<(String, String)> = body["scope_sets"]
        .as_array()
        .map(|sets| {
            sets.iter()
                .map(|s| (s["scope_set"].to_string(), s["state"].to_string()))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(
        states,
        vec![
            ("\"docs\"".to_owned(), "\"valid\"".to_owned()),
            ("\"drive\"".to_owned(), "\"missing\"".to_owned()),
            ("\"sheets\"".to_owned(), "\"missing\"".to_owned()),
        ]
    );
    assert_eq!(body["pending"], json!([]));
    Ok(())
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() -> anyhow::Result<()> {
    let h = harness(Some("s3cret"), Duration::from_secs(5))?;
    h.seed_all()?;

    let denied = h.server.get("/api/data").add_query_param("docId", "doc-1").await;
    denied.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(denied.json::<Value>()["code"], "UNAUTHORIZED");

    let allowed = h
        .server
        .get("/api/data")
        .add_query_param("docId", "doc-1")
        .authorization_bearer("s3cret")
        .await;
    allowed.assert_status_ok();

    h.server.get("/api/health").await.assert_status_ok();
    h.server.get("/").await.assert_status_ok();
    Ok(())
}
