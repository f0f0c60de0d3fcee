// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store for tests and `DATA_DIR=:memory:`.
//!
//! One mutex guards every map, so each trait method is trivially atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::audit::{LoginAuditEvent, LoginAuditLog};
use super::records::{ConsumedLogin, PendingChallenge, SessionRecord, UserRecord, WalletIdentity};
use super::{SessionStore, StoreError, StoreResult, WalletIdentityStore};
use crate::models::WalletAddress;

#[derive(Default)]
struct Inner {
    identities: HashMap<WalletAddress, WalletIdentity>,
    users: BTreeMap<u64, UserRecord>,
    next_user_id: u64,
    sessions: HashMap<String, SessionRecord>,
    audit: Vec<LoginAuditEvent>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl WalletIdentityStore for InMemoryStore {
    fn get_identity(&self, address: &WalletAddress) -> StoreResult<Option<WalletIdentity>> {
        Ok(self.lock()?.identities.get(address).cloned())
    }

    fn find_by_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
    ) -> StoreResult<Option<WalletIdentity>> {
        Ok(self
            .lock()?
            .identities
            .get(address)
            .filter(|identity| identity.has_challenge(nonce))
            .cloned())
    }

    fn put_challenge(
        &self,
        address: &WalletAddress,
        challenge: &PendingChallenge,
    ) -> StoreResult<WalletIdentity> {
        let mut inner = self.lock()?;
        let identity = inner
            .identities
            .entry(address.clone())
            .or_insert_with(|| WalletIdentity::new(address.clone(), challenge.issued_at));
        identity.set_challenge(challenge);
        Ok(identity.clone())
    }

    fn consume_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ConsumedLogin>> {
        let mut inner = self.lock()?;
        let Inner {
            identities,
            users,
            next_user_id,
            ..
        } = &mut *inner;

        let identity = match identities.get_mut(address) {
            Some(identity) if identity.has_challenge(nonce) => identity,
            _ => return Ok(None),
        };

        let (user_id, registered) = match identity.user_id {
            Some(id) => (id, false),
            None => {
                *next_user_id += 1;
                let id = *next_user_id;
                users.insert(id, UserRecord::for_address(id, address, now));
                identity.user_id = Some(id);
                (id, true)
            }
        };
        identity.clear_challenge(now);

        Ok(Some(ConsumedLogin {
            identity: identity.clone(),
            user_id,
            registered,
        }))
    }

    fn get_user(&self, user_id: u64) -> StoreResult<Option<UserRecord>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    fn health_check(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

impl SessionStore for InMemoryStore {
    fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
        self.lock()?
            .sessions
            .insert(session.token_key.clone(), session.clone());
        Ok(())
    }

    fn get_session(&self, token_key: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.lock()?.sessions.get(token_key).cloned())
    }

    fn revoke_session(
        &self,
        token_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        let mut inner = self.lock()?;
        Ok(inner.sessions.get_mut(token_key).map(|session| {
            session.revoked_at.get_or_insert(at);
            session.clone()
        }))
    }

    fn sessions_for_address(&self, address: &WalletAddress) -> StoreResult<Vec<SessionRecord>> {
        let mut sessions: Vec<SessionRecord> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| &s.address == address)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }
}

impl LoginAuditLog for InMemoryStore {
    fn append(&self, event: &LoginAuditEvent) -> StoreResult<()> {
        self.lock()?.audit.push(event.clone());
        Ok(())
    }

    fn events_for(&self, address: &WalletAddress) -> StoreResult<Vec<LoginAuditEvent>> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|e| &e.address == address)
            .cloned()
            .collect())
    }
}
