// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth client secrets as downloaded from the Google Cloud console.

use std::path::Path;

use serde::Deserialize;

/// OAuth client identity. Either the `installed` or the `web` section of
/// the console's `credentials.json`.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct SecretsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read client secrets {}: {e}", path.display())
        })?;
        Self::parse(&contents)
    }

    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)?;
        let secrets = file
            .installed
            .or(file.web)
            .ok_or_else(|| anyhow::anyhow!("client secrets have no `installed` or `web` section"))?;
        if secrets.client_id.is_empty() {
            anyhow::bail!("client secrets have an empty client_id");
        }
        Ok(secrets)
    }
}

impl std::fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_section() -> anyhow::Result<()> {
        let secrets = ClientSecrets::parse(
            r#"{"installed": {
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )?;
        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret.as_deref(), Some("shh"));
        assert_eq!(secrets.token_uri.as_deref(), Some("https://oauth2.googleapis.com/token"));
        Ok(())
    }

    #[test]
    fn falls_back_to_web_section() -> anyhow::Result<()> {
        let secrets = ClientSecrets::parse(r#"{"web": {"client_id": "web-client"}}"#)?;
        assert_eq!(secrets.client_id, "web-client");
        assert!(secrets.client_secret.is_none());
        Ok(())
    }

    #[test]
    fn rejects_file_without_client_section() {
        assert!(ClientSecrets::parse(r#"{"type": "service_account"}"#).is_err());
    }

    #[test]
    fn debug_redacts_secret() -> anyhow::Result<()> {
        let secrets = ClientSecrets::parse(r#"{"web": {"client_id": "c", "client_secret": "s3cr3t"}}"#)?;
        let rendered = format!("{secrets:?}");
        assert!(!rendered.contains("s3cr3t"));
        Ok(())
    }
}
