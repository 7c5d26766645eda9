// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redirect target of the authorization server.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use serde::Deserialize;

use crate::credential::consent::{CallbackOutcome, ConsentError};
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

fn page(status: StatusCode, title: &str, detail: &str) -> axum::response::Response {
    let body = format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{detail}</p></body></html>"
    );
    (status, Html(body)).into_response()
}

/// `GET /oauth/callback?code=&state=` (or `?error=&state=`).
pub async fn callback(
    State(s): State<Arc<GatewayState>>,
    Query(q): Query<CallbackQuery>,
) -> impl IntoResponse {
    let Some(state) = q.state.filter(|v| !v.is_empty()) else {
        return page(StatusCode::BAD_REQUEST, "Authorization failed", "Missing state parameter.");
    };

    let outcome = match (q.error, q.code) {
        (Some(error), _) => {
            let reason = match q.error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            CallbackOutcome::Denied(reason)
        }
        (None, Some(code)) if !code.is_empty() => CallbackOutcome::Code(code),
        _ => {
            return page(
                StatusCode::BAD_REQUEST,
                "Authorization failed",
                "Missing code parameter.",
            )
        }
    };
    let denied = matches!(outcome, CallbackOutcome::Denied(_));

    match s.consent.complete(&state, outcome) {
        Ok(scope_set) if denied => {
            tracing::warn!(scope_set = %scope_set, "consent denied by user");
            page(StatusCode::OK, "Authorization denied", "Access was not granted. You can close this window.")
        }
        Ok(scope_set) => {
            tracing::info!(scope_set = %scope_set, "authorization code received");
            page(
                StatusCode::OK,
                "Authorization complete",
                &format!("Access granted for {scope_set}. You can close this window."),
            )
        }
        Err(ConsentError::UnknownState) => {
            tracing::warn!("callback with unknown authorization state");
            page(
                StatusCode::BAD_REQUEST,
                "Authorization failed",
                "Unknown or expired authorization request.",
            )
        }
        Err(e) => {
            tracing::warn!(err = %e, "callback could not be delivered");
            page(StatusCode::GONE, "Authorization failed", "The authorization request is no longer waiting.")
        }
    }
}
