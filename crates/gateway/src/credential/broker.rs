// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential broker: hands out a currently valid credential per scope set.
//!
//! The state of a scope set is derived on every call from the record the
//! broker holds (in memory, else in the store):
//!
//! - no record, or one that does not cover the scope set: interactive authorization
//! - valid (`expires_at > now + skew`): returned as is
//! - expired or unknown expiry with a refresh token: refresh grant, falling
//!   back to interactive authorization when the grant is revoked
//! - expired without a refresh token: interactive authorization
//!
//! Every newly issued record is saved to the store before it is cached or
//! returned. Acquisition for one scope set is single-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinError;

use crate::credential::flight::SingleFlight;
use crate::credential::store::CredentialStore;
use crate::credential::{epoch_secs, CredentialRecord, ScopeSet, ScopeSetId};
use crate::upstream::{Authorizer, UpstreamError};

/// Why the broker could not produce a valid credential.
///
/// `Clone` because one failed attempt is reported to every caller that joined it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("authorization failed for {scope_set}: {reason}")]
    AuthorizationFailed { scope_set: ScopeSetId, reason: String },
    #[error("upstream unavailable while refreshing {scope_set}: {reason}")]
    UpstreamUnavailable { scope_set: ScopeSetId, reason: String },
    #[error("failed to persist credential for {scope_set}: {reason}")]
    PersistenceFailed { scope_set: ScopeSetId, reason: String },
    #[error("gave up waiting for a credential for {scope_set} after {waited_ms} ms")]
    TimedOut { scope_set: ScopeSetId, waited_ms: u64 },
    #[error("credential attempt aborted: {0}")]
    Aborted(String),
}

impl From<JoinError> for BrokerError {
    fn from(e: JoinError) -> Self {
        Self::Aborted(e.to_string())
    }
}

/// Lifecycle state of a scope set's credential, as reported by [`CredentialBroker::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Valid,
    Expired,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeSetStatus {
    pub scope_set: ScopeSetId,
    pub state: CredentialState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
    pub refreshable: bool,
    pub in_flight: bool,
}

pub struct CredentialBroker {
    store: Arc<dyn CredentialStore>,
    authorizer: Arc<dyn Authorizer>,
    expiry_skew_secs: u64,
    cache: RwLock<HashMap<ScopeSetId, CredentialRecord>>,
    flights: SingleFlight<ScopeSetId, CredentialRecord, BrokerError>,
}

impl CredentialBroker {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authorizer: Arc<dyn Authorizer>,
        expiry_skew_secs: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            authorizer,
            expiry_skew_secs,
            cache: RwLock::new(HashMap::new()),
            flights: SingleFlight::new(),
        })
    }

    /// Return a credential for `scope_set` that is valid beyond the expiry skew.
    ///
    /// Concurrent callers for the same scope set share one attempt and all
    /// receive its result. Dropping the returned future does not cancel the
    /// attempt.
    pub async fn acquire(
        self: &Arc<Self>,
        scope_set: &ScopeSet,
    ) -> Result<CredentialRecord, BrokerError> {
        if let Some(record) = self.cached_valid(scope_set) {
            return Ok(record);
        }

        let broker = Arc::clone(self);
        let set = scope_set.clone();
        self.flights
            .join_or_start(scope_set.id(), move || async move { broker.resolve(&set).await })
            .await
    }

    /// [`acquire`](Self::acquire), giving up after `wait`.
    ///
    /// The shared attempt keeps running and still persists its result.
    pub async fn acquire_within(
        self: &Arc<Self>,
        scope_set: &ScopeSet,
        wait: Duration,
    ) -> Result<CredentialRecord, BrokerError> {
        match tokio::time::timeout(wait, self.acquire(scope_set)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(scope_set = %scope_set.id(), "caller stopped waiting for credential");
                Err(BrokerError::TimedOut {
                    scope_set: scope_set.id().clone(),
                    waited_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// True while an acquisition or refresh for `id` is running.
    pub fn is_in_flight(&self, id: &ScopeSetId) -> bool {
        self.flights.in_flight(id)
    }

    /// Lifecycle snapshot for each of `scope_sets`. Performs no upstream I/O.
    pub async fn status<'a>(
        &self,
        scope_sets: impl IntoIterator<Item = &'a ScopeSet>,
    ) -> Vec<ScopeSetStatus> {
        let now = epoch_secs();
        let mut statuses = Vec::new();
        for set in scope_sets {
            let record = self.current_record(set).await;
            let state = match record {
                None => CredentialState::Missing,
                Some(ref r) if r.is_valid_at(now, self.expiry_skew_secs) => CredentialState::Valid,
                Some(_) => CredentialState::Expired,
            };
            statuses.push(ScopeSetStatus {
                scope_set: set.id().clone(),
                state,
                expires_in_secs: record.as_ref().and_then(|r| r.remaining_secs(now)),
                refreshable: record.as_ref().is_some_and(|r| r.refresh_token.is_some()),
                in_flight: self.is_in_flight(set.id()),
            });
        }
        statuses
    }

    fn cached_valid(&self, scope_set: &ScopeSet) -> Option<CredentialRecord> {
        let cache = self.cache.read();
        let record = cache.get(scope_set.id())?;
        (record.satisfies(scope_set) && record.is_valid_at(epoch_secs(), self.expiry_skew_secs))
            .then(|| record.clone())
    }

    fn cached(&self, scope_set: &ScopeSet) -> Option<CredentialRecord> {
        let cache = self.cache.read();
        cache.get(scope_set.id()).filter(|r| r.satisfies(scope_set)).cloned()
    }

    /// The record the broker currently holds for `scope_set`: memory first,
    /// then the store. Unusable stored records count as absent.
    async fn current_record(&self, scope_set: &ScopeSet) -> Option<CredentialRecord> {
        if let Some(record) = self.cached(scope_set) {
            return Some(record);
        }

        let id = scope_set.id();
        let store = Arc::clone(&self.store);
        let key = id.clone();
        let loaded = match tokio::task::spawn_blocking(move || store.load(&key)).await {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(scope_set = %id, err = %e, "credential load task failed");
                return None;
            }
        };

        match loaded {
            Ok(Some(record)) if record.satisfies(scope_set) => Some(record),
            Ok(Some(_)) => {
                tracing::warn!(scope_set = %id, "stored credential does not cover the scope set, ignoring it");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(scope_set = %id, err = %e, "ignoring unreadable credential record");
                None
            }
        }
    }

    /// Body of one acquisition attempt. Runs on its own task.
    async fn resolve(&self, scope_set: &ScopeSet) -> Result<CredentialRecord, BrokerError> {
        let id = scope_set.id();
        let current = self.current_record(scope_set).await;

        if let Some(ref record) = current {
            if record.is_valid_at(epoch_secs(), self.expiry_skew_secs) {
                self.cache.write().insert(id.clone(), record.clone());
                return Ok(record.clone());
            }
        }

        let issued = match current.and_then(|r| r.refresh_token) {
            Some(refresh_token) => match self.authorizer.refresh(&refresh_token, scope_set).await {
                Ok(mut record) => {
                    if record.refresh_token.is_none() {
                        record.refresh_token = Some(refresh_token);
                    }
                    tracing::debug!(scope_set = %id, "access token refreshed");
                    record
                }
                Err(UpstreamError::Revoked(reason)) => {
                    tracing::warn!(scope_set = %id, err = %reason, "refresh token revoked, reauthorizing");
                    self.authorize(scope_set).await?
                }
                Err(UpstreamError::Unavailable(reason)) => {
                    tracing::warn!(scope_set = %id, err = %reason, "refresh failed");
                    return Err(BrokerError::UpstreamUnavailable { scope_set: id.clone(), reason });
                }
                Err(e) => {
                    tracing::warn!(scope_set = %id, err = %e, "refresh rejected");
                    return Err(BrokerError::AuthorizationFailed {
                        scope_set: id.clone(),
                        reason: e.to_string(),
                    });
                }
            },
            None => self.authorize(scope_set).await?,
        };

        self.commit(scope_set, issued).await
    }

    async fn authorize(&self, scope_set: &ScopeSet) -> Result<CredentialRecord, BrokerError> {
        tracing::info!(scope_set = %scope_set.id(), "starting interactive authorization");
        self.authorizer.exchange_authorization_code(scope_set).await.map_err(|e| {
            tracing::error!(scope_set = %scope_set.id(), err = %e, "interactive authorization failed");
            BrokerError::AuthorizationFailed { scope_set: scope_set.id().clone(), reason: e.to_string() }
        })
    }

    /// Validate, persist, then publish a newly issued record.
    async fn commit(
        &self,
        scope_set: &ScopeSet,
        mut record: CredentialRecord,
    ) -> Result<CredentialRecord, BrokerError> {
        let id = scope_set.id();
        record.scope_set_id = id.clone();

        let now = epoch_secs();
        if !record.is_valid_at(now, self.expiry_skew_secs) {
            return Err(BrokerError::AuthorizationFailed {
                scope_set: id.clone(),
                reason: "issued credential has no usable lifetime".to_owned(),
            });
        }
        if !record.satisfies(scope_set) {
            return Err(BrokerError::AuthorizationFailed {
                scope_set: id.clone(),
                reason: format!("granted scopes do not cover {}", scope_set.scope_param()),
            });
        }

        let store = Arc::clone(&self.store);
        let (key, to_save) = (id.clone(), record.clone());
        let saved = tokio::task::spawn_blocking(move || store.save(&key, &to_save))
            .await
            .map_err(|e| e.to_string())
            .and_then(|r| r.map_err(|e| e.to_string()));
        if let Err(reason) = saved {
            tracing::error!(scope_set = %id, err = %reason, "failed to persist credential");
            return Err(BrokerError::PersistenceFailed { scope_set: id.clone(), reason });
        }
        self.cache.write().insert(id.clone(), record.clone());

        tracing::info!(
            scope_set = %id,
            expires_in = record.remaining_secs(now).unwrap_or(0),
            refreshable = record.refresh_token.is_some(),
            "credential stored"
        );
        Ok(record)
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
