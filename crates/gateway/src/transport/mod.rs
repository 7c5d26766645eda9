// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the gateway.

pub mod auth;
pub mod http;
pub mod oauth;

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::CALLBACK_PATH;
use crate::state::GatewayState;

/// Build the axum `Router` with all gateway routes.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        // Unauthenticated
        .route("/", get(http::index))
        .route("/api/health", get(http::health))
        .route(CALLBACK_PATH, get(oauth::callback))
        // Read operations
        .route("/api/data", get(http::fetch_document))
        .route("/api/search", get(http::search_file))
        .route("/api/sheet", get(http::read_sheet))
        // Credential lifecycle
        .route("/api/credentials", get(http::credentials_status))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
