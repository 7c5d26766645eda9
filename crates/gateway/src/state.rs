// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::credential::broker::CredentialBroker;
use crate::credential::consent::ConsentFlow;
use crate::credential::ScopeRegistry;
use crate::gateway::ApiGateway;

/// Shared gateway state handed to every handler.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub gateway: ApiGateway,
    pub broker: Arc<CredentialBroker>,
    /// Interactive authorizations waiting on `/oauth/callback`.
    pub consent: Arc<ConsentFlow>,
    pub scopes: ScopeRegistry,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        gateway: ApiGateway,
        broker: Arc<CredentialBroker>,
        consent: Arc<ConsentFlow>,
        scopes: ScopeRegistry,
    ) -> Self {
        Self { config, gateway, broker, consent, scopes }
    }
}
