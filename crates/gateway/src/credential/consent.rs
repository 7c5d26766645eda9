// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending interactive authorizations.
//!
//! An authorization code flow needs a human to visit a URL and grant
//! consent. [`ConsentFlow::await_code`] registers the flow under its `state`
//! parameter and suspends until the authorization server redirects back to
//! `/oauth/callback`, which hands the result to [`ConsentFlow::complete`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::credential::{epoch_secs, pkce, ScopeSetId};

/// What the authorization server sent back to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    Denied(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsentError {
    #[error("no consent received within {0} seconds")]
    TimedOut(u64),
    #[error("consent denied: {0}")]
    Denied(String),
    #[error("consent flow was abandoned")]
    Abandoned,
    #[error("unknown or expired authorization state")]
    UnknownState,
}

/// A flow waiting on the callback, as shown to operators.
#[derive(Debug, Clone, Serialize)]
pub struct PendingConsent {
    pub scope_set: ScopeSetId,
    pub auth_url: String,
    pub started_at: u64,
}

struct Waiter {
    info: PendingConsent,
    tx: oneshot::Sender<CallbackOutcome>,
}

pub struct ConsentFlow {
    redirect_uri: String,
    timeout: Duration,
    pending: Mutex<HashMap<String, Waiter>>,
}

impl ConsentFlow {
    pub fn new(redirect_uri: impl Into<String>, timeout: Duration) -> Self {
        Self { redirect_uri: redirect_uri.into(), timeout, pending: Mutex::new(HashMap::new()) }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Register a flow for `scope_set` and wait for its authorization code.
    ///
    /// `build_url` receives the generated `state` and returns the URL the
    /// user must visit. The registration is removed when this future
    /// finishes or is dropped.
    pub async fn await_code(
        &self,
        scope_set: &ScopeSetId,
        build_url: impl FnOnce(&str) -> String,
    ) -> Result<String, ConsentError> {
        let state = pkce::generate_state();
        let auth_url = build_url(&state);
        let (tx, rx) = oneshot::channel();

        let info = PendingConsent {
            scope_set: scope_set.clone(),
            auth_url: auth_url.clone(),
            started_at: epoch_secs(),
        };
        self.pending.lock().insert(state.clone(), Waiter { info, tx });
        let _registration = Registration { pending: &self.pending, state };

        tracing::warn!(
            scope_set = %scope_set,
            url = %auth_url,
            "authorization required: open the URL to grant access"
        );

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => Err(ConsentError::TimedOut(self.timeout.as_secs())),
            Ok(Err(_)) => Err(ConsentError::Abandoned),
            Ok(Ok(CallbackOutcome::Code(code))) => Ok(code),
            Ok(Ok(CallbackOutcome::Denied(reason))) => Err(ConsentError::Denied(reason)),
        }
    }

    /// Deliver a callback to the flow registered under `state`.
    pub fn complete(
        &self,
        state: &str,
        outcome: CallbackOutcome,
    ) -> Result<ScopeSetId, ConsentError> {
        let waiter = self.pending.lock().remove(state).ok_or(ConsentError::UnknownState)?;
        let scope_set = waiter.info.scope_set;
        waiter.tx.send(outcome).map_err(|_| ConsentError::Abandoned)?;
        Ok(scope_set)
    }

    /// Flows currently waiting for a callback, oldest first.
    pub fn pending(&self) -> Vec<PendingConsent> {
        let mut list: Vec<PendingConsent> =
            self.pending.lock().values().map(|w| w.info.clone()).collect();
        list.sort_by_key(|p| p.started_at);
        list
    }
}

struct Registration<'a> {
    pending: &'a Mutex<HashMap<String, Waiter>>,
    state: String,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.state);
    }
}

#[cfg(test)]
#[path = "consent_tests.rs"]
mod tests;
