// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credential::TokenKind;

/// Error codes for the gateway API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    ImmutableRecord,
    NoCredential,
    UpstreamError,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::ImmutableRecord => 409,
            Self::NoCredential => 503,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::ImmutableRecord => "IMMUTABLE_RECORD",
            Self::NoCredential => "NO_CREDENTIAL",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Failures surfaced by the credential engine.
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    /// Empty or invalid input to a mutation.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: TokenKind, id: String },

    #[error("{kind} {id} is read-only and cannot be removed")]
    ImmutableRecord { kind: TokenKind, id: String },

    #[error("no authorization provided")]
    NoAuthorizationProvided,

    /// The admin secret was presented but neither kind has an active record.
    #[error("server credential requested but none is configured")]
    NoServerCredentialConfigured,

    #[error("no refresh token configured")]
    NoRefreshTokenConfigured,

    #[error("refresh exchange failed: {0}")]
    RefreshExchangeFailed(String),

    #[error("refresh response did not include an access token")]
    RefreshDidNotReturnAccessToken,
}

impl CredentialError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::BadRequest,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::ImmutableRecord { .. } => ErrorCode::ImmutableRecord,
            Self::NoAuthorizationProvided => ErrorCode::Unauthorized,
            Self::NoServerCredentialConfigured | Self::NoRefreshTokenConfigured => {
                ErrorCode::NoCredential
            }
            Self::RefreshExchangeFailed(_) | Self::RefreshDidNotReturnAccessToken => {
                ErrorCode::UpstreamError
            }
        }
    }
}

impl IntoResponse for CredentialError {
    fn into_response(self) -> Response {
        self.code().to_http_response(self.to_string()).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
