// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read operations exposed to clients: document fetch, exact-name file
//! lookup, and sheet readout. Each picks its scope set, asks the broker for
//! a credential, and calls the resource API with it.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::credential::broker::{BrokerError, CredentialBroker};
use crate::credential::{ScopeRegistry, ScopeSet, DOCS, DRIVE, SHEETS};
use crate::upstream::{DocumentPayload, FileRef, ResourceApi};

/// One sheet row keyed by header, in column order. Empty cells are `None`.
pub type SheetRecord = IndexMap<String, Option<String>>;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A required input was empty. Raised before any credential or upstream call.
    #[error("{0}")]
    MissingParameter(String),
    #[error("{0}")]
    NotFound(String),
    /// The resource API call failed; carries the upstream's message.
    #[error("{0}")]
    UpstreamApi(String),
    #[error(transparent)]
    Credential(#[from] BrokerError),
}

pub struct ApiGateway {
    broker: Arc<CredentialBroker>,
    api: Arc<dyn ResourceApi>,
    docs: ScopeSet,
    drive: ScopeSet,
    sheets: ScopeSet,
}

impl ApiGateway {
    /// Wire the gateway to the `docs`, `drive`, and `sheets` scope sets of `scopes`.
    pub fn new(
        broker: Arc<CredentialBroker>,
        api: Arc<dyn ResourceApi>,
        scopes: &ScopeRegistry,
    ) -> anyhow::Result<Self> {
        let lookup = |id: &str| {
            scopes.get(id).cloned().ok_or_else(|| anyhow::anyhow!("scope set {id} is not configured"))
        };
        Ok(Self { broker, api, docs: lookup(DOCS)?, drive: lookup(DRIVE)?, sheets: lookup(SHEETS)? })
    }

    pub async fn fetch_document(&self, document_id: &str) -> Result<DocumentPayload, GatewayError> {
        if document_id.is_empty() {
            return Err(GatewayError::MissingParameter(
                "No document id provided. Please add ?docId=YOUR_DOCUMENT_ID to the URL.".to_owned(),
            ));
        }

        let credential = self.broker.acquire(&self.docs).await?;
        self.api.get_document(&credential, document_id).await.map_err(|e| {
            tracing::warn!(document_id, err = %e, "document fetch failed");
            GatewayError::UpstreamApi(e.to_string())
        })
    }

    /// First file whose name equals `name`, in upstream order.
    pub async fn find_file_by_exact_name(&self, name: &str) -> Result<FileRef, GatewayError> {
        if name.is_empty() {
            return Err(GatewayError::MissingParameter(
                "No file name provided. Please add ?fileName=YOUR_FILE_NAME to the URL.".to_owned(),
            ));
        }

        let credential = self.broker.acquire(&self.drive).await?;
        let files = self.api.search_files_by_name(&credential, name).await.map_err(|e| {
            tracing::warn!(file_name = name, err = %e, "file search failed");
            GatewayError::UpstreamApi(e.to_string())
        })?;
        if files.len() > 1 {
            tracing::debug!(file_name = name, matches = files.len(), "multiple files share the name");
        }
        files
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NotFound(format!("No file found with name: {name}")))
    }

    /// Rows of one sheet as header-keyed records. `sheet: None` reads the first sheet.
    pub async fn read_sheet(
        &self,
        spreadsheet_id: &str,
        sheet: Option<&str>,
    ) -> Result<Vec<SheetRecord>, GatewayError> {
        if spreadsheet_id.is_empty() {
            return Err(GatewayError::MissingParameter(
                "No spreadsheet id provided. Please add ?spreadsheetId=YOUR_SPREADSHEET_ID to the URL."
                    .to_owned(),
            ));
        }

        let credential = self.broker.acquire(&self.sheets).await?;
        let rows = self.api.read_sheet(&credential, spreadsheet_id, sheet).await.map_err(|e| {
            tracing::warn!(spreadsheet_id, err = %e, "sheet read failed");
            GatewayError::UpstreamApi(e.to_string())
        })?;
        Ok(rows_to_records(rows))
    }
}

/// Map rows under the first (header) row. Short rows are padded with `null`,
/// cells past the header are dropped, and records left with no value are skipped.
pub fn rows_to_records(rows: Vec<Vec<String>>) -> Vec<SheetRecord> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    rows.map(|row| {
        let mut cells = row.into_iter();
        header
            .iter()
            .map(|column| {
                let value = cells.next().filter(|cell| !cell.is_empty());
                (column.clone(), value)
            })
            .collect::<SheetRecord>()
    })
    .filter(|record| record.values().any(Option::is_some))
    .collect()
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
