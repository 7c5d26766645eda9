// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credential::broker::BrokerError;
use crate::gateway::GatewayError;

/// Message returned for any credential failure. Details stay in the logs.
const CREDENTIAL_FAILURE_MESSAGE: &str = "Unable to obtain credentials for the upstream service.";
const INTERNAL_FAILURE_MESSAGE: &str = "Internal error.";

/// Error codes for the gateway API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    UpstreamError,
    CredentialUnavailable,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::UpstreamError => 500,
            Self::CredentialUnavailable => 500,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::CredentialUnavailable => "CREDENTIAL_UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorResponse {
        ErrorResponse { error: message.into(), code: self.as_str().to_owned() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_error_body(message)))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingParameter(_) => ErrorCode::BadRequest,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::UpstreamApi(_) => ErrorCode::UpstreamError,
            Self::Credential(BrokerError::Aborted(_)) => ErrorCode::Internal,
            Self::Credential(_) => ErrorCode::CredentialUnavailable,
        }
    }

    /// Message shown to API callers. Credential failures are opaque.
    pub fn public_message(&self) -> String {
        match self {
            Self::Credential(BrokerError::Aborted(_)) => INTERNAL_FAILURE_MESSAGE.to_owned(),
            Self::Credential(_) => CREDENTIAL_FAILURE_MESSAGE.to_owned(),
            other => other.to_string(),
        }
    }

    pub fn to_http_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        self.error_code().to_http_response(self.public_message())
    }
}

/// Error envelope: `{"error": "<message>", "code": "<CODE>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
