// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge issuance: nonce generation, expiry and message rendering.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use super::error::AuthError;
use super::message::{render_login_message, LoginChallenge, LoginDomain};
use crate::models::WalletAddress;
use crate::storage::{PendingChallenge, WalletIdentityStore};

/// Nonce entropy in bytes (128 bits).
pub const NONCE_BYTES: usize = 16;

/// A freshly issued challenge as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub message: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

pub struct ChallengeIssuer {
    store: Arc<dyn WalletIdentityStore>,
    domain: LoginDomain,
    ttl: Duration,
    rng: SystemRandom,
}

impl ChallengeIssuer {
    pub fn new(store: Arc<dyn WalletIdentityStore>, domain: LoginDomain, ttl: Duration) -> Self {
        Self {
            store,
            domain,
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a challenge for `address`, replacing any outstanding one.
    pub fn issue(&self, address: &WalletAddress) -> Result<IssuedChallenge, AuthError> {
        let nonce = self.generate_nonce()?;
        let issued_at = Utc::now();
        let expires_at = expiry_after(issued_at, self.ttl)?;

        self.store.put_challenge(
            address,
            &PendingChallenge {
                nonce: nonce.clone(),
                issued_at,
                expires_at,
            },
        )?;

        let message = self.render(&LoginChallenge {
            address: address.clone(),
            nonce: nonce.clone(),
            expires_at,
        });
        Ok(IssuedChallenge {
            message,
            nonce,
            expires_at,
        })
    }

    /// Re-derive the message for a stored challenge.
    pub fn render(&self, challenge: &LoginChallenge) -> String {
        render_login_message(&self.domain, challenge)
    }

    fn generate_nonce(&self) -> Result<String, AuthError> {
        let mut bytes = [0u8; NONCE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::Internal("system RNG unavailable".to_string()))?;
        Ok(alloy::hex::encode(bytes))
    }
}

/// `issued_at + ttl`, truncated to whole seconds.
fn expiry_after(issued_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    let ttl_secs = i64::try_from(ttl.as_secs())
        .map_err(|_| AuthError::Internal("challenge ttl out of range".to_string()))?;
    DateTime::from_timestamp(issued_at.timestamp() + ttl_secs, 0)
        .ok_or_else(|| AuthError::Internal("challenge expiry out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::message::MessageFormat;
    use crate::storage::InMemoryStore;

    fn issuer(store: Arc<InMemoryStore>) -> ChallengeIssuer {
        ChallengeIssuer::new(
            store,
            LoginDomain {
                app_name: "MetaFarm".to_string(),
                app_version: "1.0.0".to_string(),
                chain_id: 137,
                format: MessageFormat::TypedData,
            },
            Duration::from_secs(1800),
        )
    }

    #[test]
    fn issue_stores_nonce_and_renders_from_stored_values() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer(store.clone());
        let address = WalletAddress::from("0xABCDEF0123456789abcdef0123456789abcdef01");

        let issued = issuer.issue(&address).unwrap();
        assert_eq!(issued.nonce.len(), NONCE_BYTES * 2);
        assert!(issued.nonce.chars().all(|c| c.is_ascii_hexdigit()));

        let identity = store.get_identity(&address).unwrap().unwrap();
        assert_eq!(identity.nonce.as_deref(), Some(issued.nonce.as_str()));
        assert_eq!(identity.challenge_expires_at, Some(issued.expires_at));

        let rerendered = issuer.render(&LoginChallenge {
            address,
            nonce: issued.nonce.clone(),
            expires_at: issued.expires_at,
        });
        assert_eq!(rerendered, issued.message);
    }

    #[test]
    fn nonces_are_unique_and_expiry_is_whole_seconds() {
        let store = Arc::new(InMemoryStore::new());
        let issuer = issuer(store);
        let address = WalletAddress::from("0x1111111111111111111111111111111111111111");

        let a = issuer.issue(&address).unwrap();
        let b = issuer.issue(&address).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.expires_at.timestamp_subsec_nanos(), 0);
        assert!(a.expires_at > Utc::now() + chrono::Duration::minutes(29));
    }
}
