// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer session tokens.
//!
//! A token is 32 random bytes, base64url encoded, and is only ever handed
//! to the client. Storage sees `HMAC-SHA256(secret, token)` as the row key,
//! so a leaked database does not yield usable credentials.

use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::Sha256;

use super::error::AuthError;
use crate::models::{ClientMeta, WalletAddress};
use crate::storage::{Lookup, SessionCache, SessionRecord, SessionStore};

type HmacSha256 = Hmac<Sha256>;

/// Raw token entropy in bytes.
pub const TOKEN_BYTES: usize = 32;

/// Generates tokens and derives their storage keys.
pub struct SessionTokens {
    mac: HmacSha256,
    rng: SystemRandom,
}

impl SessionTokens {
    /// Use `secret` as the HMAC key, or a random per-process key when unset.
    pub fn new(secret: Option<&[u8]>) -> Result<Self, AuthError> {
        let rng = SystemRandom::new();
        let mac = match secret {
            Some(secret) => HmacSha256::new_from_slice(secret),
            None => {
                tracing::warn!(
                    "SESSION_TOKEN_SECRET not set, using a random key; sessions will not survive a restart"
                );
                let mut key = [0u8; 32];
                rng.fill(&mut key)
                    .map_err(|_| AuthError::Internal("system RNG unavailable".to_string()))?;
                HmacSha256::new_from_slice(&key)
            }
        }
        .map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(Self { mac, rng })
    }

    pub fn generate(&self) -> Result<String, AuthError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::Internal("system RNG unavailable".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }

    /// Storage key for a raw token.
    pub fn lookup_key(&self, token: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(token.as_bytes());
        alloy::hex::encode(mac.finalize().into_bytes())
    }
}

/// Session creation, lookup and revocation over a [`SessionStore`].
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    tokens: SessionTokens,
    cache: Option<SessionCache>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        tokens: SessionTokens,
        cache: Option<SessionCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            cache,
            ttl,
        }
    }

    /// Mint and persist a session. Returns the raw token and the stored row.
    pub fn create(
        &self,
        user_id: u64,
        address: &WalletAddress,
        client: &ClientMeta,
    ) -> Result<(String, SessionRecord), AuthError> {
        let token = self.tokens.generate()?;
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal("session expiry out of range".to_string()))?;

        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            token_key: self.tokens.lookup_key(&token),
            user_id,
            address: address.clone(),
            expires_at,
            revoked_at: None,
            created_at: now,
            client: client.clone(),
        };
        self.store.insert_session(&record)?;
        Ok((token, record))
    }

    /// Look a token up, cache first.
    pub fn get(&self, token: &str) -> Result<Option<SessionRecord>, AuthError> {
        let key = self.tokens.lookup_key(token);
        let Some(cache) = &self.cache else {
            return Ok(self.store.get_session(&key)?);
        };

        let seen = match cache.get(&key) {
            Lookup::Hit(session) => return Ok(Some(session)),
            Lookup::Miss(seen) => seen,
        };
        let session = self.store.get_session(&key)?;
        if let Some(session) = &session {
            // Skipped if a revocation raced the read
            cache.put(session.clone(), seen);
        }
        Ok(session)
    }

    /// Idempotent. Returns the stored row, if the token was ever issued.
    pub fn revoke(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, AuthError> {
        let key = self.tokens.lookup_key(token);
        let revoked = self.store.revoke_session(&key, at)?;
        if let Some(cache) = &self.cache {
            cache.invalidate(&key);
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStore, StoreResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Barrier;

    /// Session store whose next `get_session` stops after reading until the
    /// test lets it go.
    struct PausingStore {
        inner: InMemoryStore,
        armed: AtomicBool,
        read_done: Barrier,
        resume: Barrier,
    }

    impl PausingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStore::new(),
                armed: AtomicBool::new(false),
                read_done: Barrier::new(2),
                resume: Barrier::new(2),
            }
        }
    }

    impl SessionStore for PausingStore {
        fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
            self.inner.insert_session(session)
        }

        fn get_session(&self, token_key: &str) -> StoreResult<Option<SessionRecord>> {
            let session = self.inner.get_session(token_key);
            if self.armed.swap(false, Ordering::SeqCst) {
                self.read_done.wait();
                self.resume.wait();
            }
            session
        }

        fn revoke_session(
            &self,
            token_key: &str,
            at: DateTime<Utc>,
        ) -> StoreResult<Option<SessionRecord>> {
            self.inner.revoke_session(token_key, at)
        }

        fn sessions_for_address(
            &self,
            address: &WalletAddress,
        ) -> StoreResult<Vec<SessionRecord>> {
            self.inner.sessions_for_address(address)
        }
    }

    fn manager(store: Arc<InMemoryStore>) -> SessionManager {
        SessionManager::new(
            store,
            SessionTokens::new(Some(&b"test-secret"[..])).unwrap(),
            SessionCache::new(16, Duration::from_secs(30)),
            Duration::from_secs(3600),
        )
    }

    fn addr() -> WalletAddress {
        WalletAddress::from("0x1111111111111111111111111111111111111111")
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let tokens = SessionTokens::new(None).unwrap();
        let a = tokens.generate().unwrap();
        let b = tokens.generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn lookup_key_depends_on_secret() {
        let one = SessionTokens::new(Some(&b"one"[..])).unwrap();
        let two = SessionTokens::new(Some(&b"two"[..])).unwrap();
        assert_eq!(one.lookup_key("t"), one.lookup_key("t"));
        assert_ne!(one.lookup_key("t"), two.lookup_key("t"));
        assert_ne!(one.lookup_key("t"), "t");
    }

    #[test]
    fn raw_token_is_never_stored() {
        let store = Arc::new(InMemoryStore::new());
        let manager = manager(store.clone());
        let (token, record) = manager
            .create(1, &addr(), &ClientMeta::default())
            .unwrap();

        assert_ne!(record.token_key, token);
        let stored = store.sessions_for_address(&addr()).unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!serde_json::to_string(&stored[0]).unwrap().contains(&token));
    }

    #[test]
    fn revoke_invalidates_cached_copy() {
        let store = Arc::new(InMemoryStore::new());
        let manager = manager(store);
        let (token, _) = manager
            .create(1, &addr(), &ClientMeta::default())
            .unwrap();

        assert!(manager.get(&token).unwrap().is_some());
        manager.revoke(&token, Utc::now()).unwrap();
        assert!(manager.get(&token).unwrap().unwrap().revoked_at.is_some());
    }

    #[test]
    fn revoke_during_lookup_does_not_leave_stale_cache_entry() {
        let store = Arc::new(PausingStore::new());
        let manager = Arc::new(SessionManager::new(
            store.clone(),
            SessionTokens::new(Some(&b"test-secret"[..])).unwrap(),
            SessionCache::new(16, Duration::from_secs(30)),
            Duration::from_secs(3600),
        ));
        let (token, _) = manager
            .create(1, &addr(), &ClientMeta::default())
            .unwrap();

        store.armed.store(true, Ordering::SeqCst);
        let lookup = std::thread::spawn({
            let manager = manager.clone();
            let token = token.clone();
            move || manager.get(&token)
        });

        // The lookup has read the still-active row and is paused before caching it
        store.read_done.wait();
        manager.revoke(&token, Utc::now()).unwrap();
        store.resume.wait();

        let raced = lookup.join().unwrap().unwrap().unwrap();
        assert!(raced.revoked_at.is_none());

        let after = manager.get(&token).unwrap().unwrap();
        assert!(after.revoked_at.is_some());
    }

    #[test]
    fn oversized_ttl_is_an_error_not_a_panic() {
        let manager = SessionManager::new(
            Arc::new(InMemoryStore::new()),
            SessionTokens::new(Some(&b"test-secret"[..])).unwrap(),
            None,
            Duration::from_secs(10_000_000_000_000),
        );
        assert!(matches!(
            manager.create(1, &addr(), &ClientMeta::default()),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn unknown_token_is_none() {
        let manager = manager(Arc::new(InMemoryStore::new()));
        assert!(manager.get("nope").unwrap().is_none());
        assert!(manager.revoke("nope", Utc::now()).unwrap().is_none());
    }
}
