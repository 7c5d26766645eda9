// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docgate: delegated-access gateway for Google Docs, Drive, and Sheets.

pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod state;
pub mod transport;
pub mod upstream;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::credential::broker::CredentialBroker;
use crate::credential::consent::ConsentFlow;
use crate::credential::store::{CredentialStore, FileCredentialStore};
use crate::gateway::ApiGateway;
use crate::state::GatewayState;
use crate::transport::build_router;
use crate::upstream::google::{GoogleApi, GoogleAuthorizer, GoogleEndpoints};
use crate::upstream::secrets::ClientSecrets;
use crate::upstream::{Authorizer, ResourceApi};

/// Wire the Google-backed gateway from `config`.
pub fn build_state(config: GatewayConfig) -> anyhow::Result<GatewayState> {
    let scopes = config.scope_registry()?;
    let secrets = ClientSecrets::load(&config.client_secrets)?;
    let endpoints = GoogleEndpoints::default().with_secrets(&secrets);
    let http = reqwest::Client::builder().timeout(config.http_timeout()).build()?;

    let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::open(config.credentials_dir())?);
    let consent = Arc::new(ConsentFlow::new(config.redirect_uri(), config.consent_timeout()));
    let authorizer: Arc<dyn Authorizer> = Arc::new(GoogleAuthorizer::new(
        http.clone(),
        secrets,
        endpoints.clone(),
        Arc::clone(&consent),
    ));
    let api: Arc<dyn ResourceApi> = Arc::new(GoogleApi::new(http, endpoints));

    let broker = CredentialBroker::new(store, authorizer, config.expiry_skew_secs);
    let gateway = ApiGateway::new(Arc::clone(&broker), api, &scopes)?;
    Ok(GatewayState::new(config, gateway, broker, consent, scopes))
}

/// Run the gateway until ctrl-c.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    config.validate()?;
    let addr = config.bind_addr();
    let redirect_uri = config.redirect_uri();
    let state = Arc::new(build_state(config)?);

    tracing::info!(
        scope_sets = state.scopes.len(),
        redirect_uri = %redirect_uri,
        "docgate listening on {addr}"
    );
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

/// Cancel `shutdown` on ctrl-c.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(err = %e, "failed to listen for ctrl-c"),
        }
    });
}
