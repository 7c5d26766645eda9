// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::credential::{default_state_dir, ScopeConfig, ScopeRegistry};

/// Callback path registered as the OAuth redirect URI.
pub const CALLBACK_PATH: &str = "/oauth/callback";

/// Upper bound on the expiry skew. Google access tokens live for an hour,
/// so a larger skew would treat every fresh token as expired.
const MAX_EXPIRY_SKEW_SECS: u64 = 3600;

/// Delegated-access gateway for Google Docs, Drive, and Sheets.
#[derive(Debug, Clone, Parser)]
#[command(name = "docgate", version, about)]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "DOCGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 5000, env = "DOCGATE_PORT")]
    pub port: u16,

    /// Bearer token required on API requests. If unset, auth is disabled.
    #[arg(long, env = "DOCGATE_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Directory for persisted credentials.
    #[arg(long, env = "DOCGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Google OAuth client secrets (`credentials.json`).
    #[arg(long, default_value = "credentials.json", env = "DOCGATE_CLIENT_SECRETS")]
    pub client_secrets: PathBuf,

    /// Externally reachable base URL, used to build the OAuth redirect URI.
    #[arg(long, env = "DOCGATE_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Seconds before expiry at which a credential is treated as expired.
    #[arg(long, default_value_t = 10, env = "DOCGATE_EXPIRY_SKEW_SECS")]
    pub expiry_skew_secs: u64,

    /// How long an interactive authorization waits for the user's consent.
    #[arg(long, default_value_t = 300, env = "DOCGATE_CONSENT_TIMEOUT_SECS")]
    pub consent_timeout_secs: u64,

    /// Timeout for each request to Google.
    #[arg(long, default_value_t = 30, env = "DOCGATE_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,

    /// JSON file overriding the scopes of individual scope sets.
    #[arg(long, env = "DOCGATE_SCOPE_CONFIG")]
    pub scope_config: Option<PathBuf>,

    /// Log filter (e.g. `info`, `docgate=debug,tower_http=debug`).
    #[arg(long, default_value = "info", env = "DOCGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "DOCGATE_LOG_FORMAT")]
    pub log_format: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format: {} (expected text or json)", self.log_format);
        }
        if self.auth_token.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("--auth-token must not be empty");
        }
        if self.consent_timeout_secs == 0 {
            anyhow::bail!("--consent-timeout-secs must be positive");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("--http-timeout-secs must be positive");
        }
        if self.expiry_skew_secs >= MAX_EXPIRY_SKEW_SECS {
            anyhow::bail!("--expiry-skew-secs must be less than {MAX_EXPIRY_SKEW_SECS}");
        }
        if let Some(ref url) = self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("--public-url must be an http(s) URL: {url}");
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Redirect URI registered with the authorization server.
    pub fn redirect_uri(&self) -> String {
        let base = match self.public_url {
            Some(ref url) => url.trim_end_matches('/').to_owned(),
            None => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" => "localhost",
                    other => other,
                };
                format!("http://{host}:{}", self.port)
            }
        };
        format!("{base}{CALLBACK_PATH}")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    /// Directory holding one credential file per scope set.
    pub fn credentials_dir(&self) -> PathBuf {
        self.state_dir().join("credentials")
    }

    /// Built-in scope sets with any `--scope-config` overrides applied.
    pub fn scope_registry(&self) -> anyhow::Result<ScopeRegistry> {
        let registry = ScopeRegistry::google_defaults();
        let Some(ref path) = self.scope_config else {
            return Ok(registry);
        };
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read scope config {}: {e}", path.display())
        })?;
        let overrides: ScopeConfig = serde_json::from_str(&contents)?;
        registry.with_overrides(overrides)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
