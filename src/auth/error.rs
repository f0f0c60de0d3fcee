// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! The variants keep the precise internal reason for logs and the audit
//! trail. At the HTTP boundary every verification failure collapses into
//! the same `401 {"error":"unauthorized"}` body, so a caller cannot tell a
//! wrong nonce from a bad signature or an unknown session.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::storage::StoreError;

/// Seconds a client should wait before retrying a `503`.
pub const RETRY_AFTER_SECS: u64 = 5;

/// Authentication error type.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    /// No outstanding challenge matches the `(address, nonce)` pair
    #[error("no matching challenge")]
    ChallengeNotFound,
    /// The embedded expiry has passed
    #[error("challenge expired")]
    ChallengeExpired,
    /// Signature did not recover to the claimed address
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("session revoked")]
    SessionRevoked,
    /// Storage collaborator failed
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// No bearer header and no session cookie
    #[error("missing session credentials")]
    MissingCredentials,
    /// Authorization header present but not `Bearer <token>`
    #[error("invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// The request was abandoned before the login committed
    #[error("request cancelled")]
    Cancelled,
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable code for logs and audit events.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::ChallengeNotFound => "challenge_not_found",
            AuthError::ChallengeExpired => "challenge_expired",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::SessionExpired => "session_expired",
            AuthError::SessionRevoked => "session_revoked",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::Cancelled => "cancelled",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ChallengeNotFound
            | AuthError::ChallengeExpired
            | AuthError::SignatureInvalid
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::SessionRevoked
            | AuthError::MissingCredentials
            | AuthError::InvalidAuthHeader => StatusCode::UNAUTHORIZED,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            // Nobody is listening for the response any more
            AuthError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message shown to clients.
    pub fn public_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::SERVICE_UNAVAILABLE => "service unavailable",
            _ => "internal server error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status_code() == StatusCode::SERVICE_UNAVAILABLE
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
