// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Login Protocol
//!
//! Ties challenge issuance, signature verification, the identity store and
//! the session manager into the four public operations.
//!
//! ## Per-address State
//!
//! Driven by the stored nonce:
//!
//! ```text
//! NoChallenge --issue--> ChallengeOutstanding --login--> NoChallenge
//!                          |        ^
//!                          +-issue--+   (overwrites the previous nonce)
//! ```
//!
//! ## Login Ordering
//!
//! Every check runs against stored values before anything is written. The
//! compare-and-clear of the nonce is the only write that precedes session
//! creation, and the cancellation token is checked immediately before it,
//! so an abandoned request never consumes a nonce.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::audit::AuditSink;
use super::challenge::{ChallengeIssuer, IssuedChallenge};
use super::error::AuthError;
use super::message::{LoginChallenge, LoginDomain};
use super::session::{SessionManager, SessionTokens};
use super::signature::SignatureVerifier;
use crate::config::AuthConfig;
use crate::models::{ClientMeta, LoginRequest, WalletAddress};
use crate::storage::{
    LoginAuditEvent, SessionCache, SessionRecord, SessionStore, UserRecord, WalletIdentityStore,
};

/// What a client submits to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub address: WalletAddress,
    pub signature: String,
    pub nonce: String,
}

impl From<LoginRequest> for LoginAttempt {
    fn from(req: LoginRequest) -> Self {
        Self {
            address: req.address,
            signature: req.signature,
            nonce: req.nonce,
        }
    }
}

/// A successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub user_id: u64,
    pub address: WalletAddress,
    /// Raw bearer token. Only ever returned to the client.
    pub session_token: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    /// `true` when this login created the user.
    pub registered: bool,
}

/// The identity behind a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: u64,
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
}

impl From<SessionRecord> for SessionInfo {
    fn from(record: SessionRecord) -> Self {
        Self {
            session_id: record.id,
            user_id: record.user_id,
            address: record.address,
            expires_at: record.expires_at,
        }
    }
}

pub struct AuthProtocol {
    issuer: ChallengeIssuer,
    verifier: SignatureVerifier,
    identities: Arc<dyn WalletIdentityStore>,
    sessions: SessionManager,
    audit: AuditSink,
}

impl AuthProtocol {
    pub fn new(
        config: &AuthConfig,
        identities: Arc<dyn WalletIdentityStore>,
        sessions: Arc<dyn SessionStore>,
        audit: AuditSink,
    ) -> Result<Self, AuthError> {
        let domain = LoginDomain {
            app_name: config.app_name.clone(),
            app_version: config.app_version.clone(),
            chain_id: config.chain_id,
            format: config.message_format,
        };
        let tokens = SessionTokens::new(config.session_token_secret.as_deref())?;
        let cache = SessionCache::new(config.session_cache_capacity, config.session_cache_ttl);

        Ok(Self {
            issuer: ChallengeIssuer::new(identities.clone(), domain, config.challenge_ttl),
            verifier: SignatureVerifier::new(),
            identities,
            sessions: SessionManager::new(sessions, tokens, cache, config.session_ttl),
            audit,
        })
    }

    /// Issue a fresh challenge, invalidating any outstanding one.
    pub fn issue_challenge(&self, address: &WalletAddress) -> Result<IssuedChallenge, AuthError> {
        let issued = self.issuer.issue(address)?;
        info!(%address, expires_at = %issued.expires_at, "Issued login challenge");
        Ok(issued)
    }

    /// Verify a signed challenge and mint a session.
    ///
    /// Every outcome is audited, with the precise failure code.
    pub fn verify_and_login(
        &self,
        attempt: &LoginAttempt,
        client: &ClientMeta,
        cancel: &CancellationToken,
    ) -> Result<LoginSession, AuthError> {
        let result = self.try_login(attempt, client, cancel);

        let event = LoginAuditEvent::new(attempt.address.clone()).with_client(client);
        match &result {
            Ok(login) => {
                info!(
                    address = %login.address,
                    user_id = login.user_id,
                    registered = login.registered,
                    "Wallet login succeeded"
                );
                self.audit.record(event.with_user(login.user_id));
            }
            Err(err) => {
                warn!(
                    address = %attempt.address,
                    error_code = err.error_code(),
                    "Wallet login failed"
                );
                self.audit.record(event.failed(err.error_code()));
            }
        }
        result
    }

    fn try_login(
        &self,
        attempt: &LoginAttempt,
        client: &ClientMeta,
        cancel: &CancellationToken,
    ) -> Result<LoginSession, AuthError> {
        let address = &attempt.address;
        if attempt.nonce.is_empty() {
            return Err(AuthError::ChallengeNotFound);
        }

        let identity = self
            .identities
            .find_by_challenge(address, &attempt.nonce)?
            .ok_or(AuthError::ChallengeNotFound)?;
        let (nonce, expires_at) = match (identity.nonce, identity.challenge_expires_at) {
            (Some(nonce), Some(expires_at)) => (nonce, expires_at),
            _ => return Err(AuthError::ChallengeNotFound),
        };

        let now = Utc::now();
        if now >= expires_at {
            return Err(AuthError::ChallengeExpired);
        }

        let message = self.issuer.render(&LoginChallenge {
            address: identity.address,
            nonce,
            expires_at,
        });
        self.verifier
            .verify(address, &message, &attempt.signature)
            .map_err(|e| {
                debug!(%address, reason = %e, "Signature rejected");
                AuthError::SignatureInvalid
            })?;

        if cancel.is_cancelled() {
            return Err(AuthError::Cancelled);
        }

        let consumed = self
            .identities
            .consume_challenge(address, &attempt.nonce, now)?
            .ok_or(AuthError::ChallengeNotFound)?;
        if consumed.registered {
            info!(%address, user_id = consumed.user_id, "Registered new user");
        }

        let (session_token, session) = self.sessions.create(consumed.user_id, address, client)?;
        Ok(LoginSession {
            user_id: consumed.user_id,
            address: address.clone(),
            session_token,
            session_id: session.id,
            expires_at: session.expires_at,
            registered: consumed.registered,
        })
    }

    /// Resolve a bearer token to its identity.
    pub fn validate_session(&self, token: &str) -> Result<SessionInfo, AuthError> {
        let session = self
            .sessions
            .get(token)?
            .ok_or(AuthError::SessionNotFound)?;
        let now = Utc::now();
        if !session.is_active_at(now) {
            return Err(if now >= session.expires_at {
                AuthError::SessionExpired
            } else {
                AuthError::SessionRevoked
            });
        }
        Ok(session.into())
    }

    /// The user a validated session belongs to.
    pub fn session_user(&self, session: &SessionInfo) -> Result<UserRecord, AuthError> {
        self.identities.get_user(session.user_id)?.ok_or_else(|| {
            AuthError::Internal(format!("user {} missing for session", session.user_id))
        })
    }

    /// Revoke a token. Unknown and already-revoked tokens are not errors.
    pub fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        match self.sessions.revoke(token, Utc::now())? {
            Some(session) => info!(session_id = %session.id, address = %session.address, "Session revoked"),
            None => debug!("Revocation for unknown session token"),
        }
        Ok(())
    }

    /// Storage round trip for readiness probes.
    pub fn health_check(&self) -> Result<(), AuthError> {
        Ok(self.identities.health_check()?)
    }
}
