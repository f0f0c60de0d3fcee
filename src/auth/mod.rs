// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet challenge-response login with bearer sessions.
//!
//! ## Auth Flow
//!
//! 1. Client sends `POST /login/message` with its wallet address
//! 2. Server stores a fresh nonce for the address and returns the message
//!    to sign (bound to app name/version, address, nonce and expiry)
//! 3. Wallet signs the message with `personal_sign`
//! 4. Client sends `POST /login` with address, signature and nonce
//! 5. Server:
//!    - Re-derives the message from the *stored* nonce and expiry
//!    - Recovers the signer and compares it with the claimed address
//!    - Atomically clears the nonce, creating the user on first login
//!    - Mints a session token
//! 6. Later requests carry `Authorization: Bearer <token>` or the
//!    `session_token` cookie
//!
//! ## Security
//!
//! - One outstanding nonce per address; a new challenge replaces the old
//! - Nonces are single use, even under concurrent replays
//! - Every verification failure is reported as the same `401`
//! - Session tokens are stored only as `HMAC-SHA256(secret, token)`

pub mod audit;
pub mod challenge;
pub mod error;
pub mod extractor;
pub mod message;
pub mod protocol;
pub mod session;
pub mod signature;

pub use audit::{audit_channel, AuditSink, AuditWriter};
pub use challenge::{ChallengeIssuer, IssuedChallenge};
pub use error::AuthError;
pub use extractor::{Auth, SessionToken, SESSION_COOKIE};
pub use message::{LoginDomain, MessageFormat};
pub use protocol::{AuthProtocol, LoginAttempt, LoginSession, SessionInfo};
pub use signature::{SignatureError, SignatureVerifier};

/// Run a storage-touching protocol call off the async executor.
pub async fn run_blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(format!("blocking task failed: {e}")))?
}
