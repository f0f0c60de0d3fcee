// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted row types shared by every backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ClientMeta, WalletAddress};

/// A wallet's identity row.
///
/// `nonce` and `challenge_expires_at` are set together by challenge
/// issuance and cleared together by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletIdentity {
    pub address: WalletAddress,
    /// Bound on the first successful login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// Outstanding challenge nonce. `None` means no challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletIdentity {
    /// A never-seen address with no challenge and no user.
    pub fn new(address: WalletAddress, now: DateTime<Utc>) -> Self {
        Self {
            address,
            user_id: None,
            nonce: None,
            challenge_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_challenge(&self, nonce: &str) -> bool {
        self.nonce.as_deref() == Some(nonce)
    }

    pub(crate) fn set_challenge(&mut self, challenge: &PendingChallenge) {
        self.nonce = Some(challenge.nonce.clone());
        self.challenge_expires_at = Some(challenge.expires_at);
        self.updated_at = challenge.issued_at;
    }

    pub(crate) fn clear_challenge(&mut self, now: DateTime<Utc>) {
        self.nonce = None;
        self.challenge_expires_at = None;
        self.last_login_at = Some(now);
        self.updated_at = now;
    }
}

/// The values written by a challenge issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An application user. Created implicitly on first login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn for_address(id: u64, address: &WalletAddress, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: format!("user_{}", address.short_suffix()),
            created_at: now,
        }
    }
}

/// Result of a successful compare-and-clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedLogin {
    pub identity: WalletIdentity,
    pub user_id: u64,
    /// `true` when this login created the user.
    pub registered: bool,
}

/// A stored bearer session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    /// HMAC of the bearer token; the token itself is never stored.
    pub token_key: String,
    pub user_id: u64,
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub client: ClientMeta,
}

impl SessionRecord {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.revoked_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn challenge_set_and_clear() {
        let now = Utc::now();
        let mut identity = WalletIdentity::new(WalletAddress::from("0xAB"), now);
        identity.set_challenge(&PendingChallenge {
            nonce: "n1".to_string(),
            issued_at: now,
            expires_at: now + Duration::minutes(30),
        });
        assert!(identity.has_challenge("n1"));
        assert!(!identity.has_challenge("N1"));

        identity.clear_challenge(now);
        assert!(!identity.has_challenge("n1"));
        assert!(identity.challenge_expires_at.is_none());
        assert_eq!(identity.last_login_at, Some(now));
    }

    #[test]
    fn username_uses_address_suffix() {
        let user = UserRecord::for_address(
            7,
            &WalletAddress::from("0x00000000000000000000000000000000CAFEBABE"),
            Utc::now(),
        );
        assert_eq!(user.username, "user_cafebabe");
    }

    #[test]
    fn session_activity_window() {
        let now = Utc::now();
        let mut session = SessionRecord {
            id: "s".to_string(),
            token_key: "k".to_string(),
            user_id: 1,
            address: WalletAddress::from("0xab"),
            expires_at: now + Duration::hours(1),
            revoked_at: None,
            created_at: now,
            client: ClientMeta::default(),
        };
        assert!(session.is_active_at(now));
        assert!(!session.is_active_at(now + Duration::hours(1)));
        session.revoked_at = Some(now);
        assert!(!session.is_active_at(now));
    }
}
