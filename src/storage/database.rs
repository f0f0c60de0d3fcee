// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded identity/session database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `wallet_identities`: lowercase address → serialized WalletIdentity
//! - `users`: user id → serialized UserRecord
//! - `counters`: name → u64 (`next_user_id`)
//! - `sessions`: token key → serialized SessionRecord
//! - `address_sessions`: composite key (address|created_at|token key) → token key
//! - `login_audit`: composite key (address|timestamp|event id) → serialized LoginAuditEvent
//!
//! redb serialises write transactions, so every read-modify-write below is
//! atomic. A `WriteTransaction` that is dropped without `commit()` is rolled
//! back, which covers every early `return` and `?`.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{
    AccessGuard, Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;

use super::audit::{LoginAuditEvent, LoginAuditLog};
use super::records::{ConsumedLogin, PendingChallenge, SessionRecord, UserRecord, WalletIdentity};
use super::{SessionStore, StoreResult, WalletIdentityStore};
use crate::models::WalletAddress;

// =============================================================================
// Table Definitions
// =============================================================================

const WALLET_IDENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("wallet_identities");

const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Index: `address|created_at_be|token_key` → token key.
const ADDRESS_SESSIONS: TableDefinition<&[u8], &str> = TableDefinition::new("address_sessions");

/// `address|timestamp_be|event_id` → serialized LoginAuditEvent.
const LOGIN_AUDIT: TableDefinition<&[u8], &[u8]> = TableDefinition::new("login_audit");

const NEXT_USER_ID: &str = "next_user_id";

/// File name of the database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "metafarm-auth.redb";

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key: `address | timestamp_be_bytes | suffix`.
///
/// Big-endian timestamps keep entries for one address in time order.
fn make_index_key(address: &WalletAddress, timestamp: i64, suffix: &str) -> Vec<u8> {
    let addr = address.as_str();
    let mut key = Vec::with_capacity(addr.len() + 1 + 8 + 1 + suffix.len());
    key.extend_from_slice(addr.as_bytes());
    key.push(b'|');
    // Flip the sign bit so negative timestamps still sort first
    key.extend_from_slice(&((timestamp as u64) ^ (1 << 63)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(suffix.as_bytes());
    key
}

/// Build a prefix key for range scanning all entries of an address.
fn make_prefix(address: &WalletAddress) -> Vec<u8> {
    let addr = address.as_str();
    let mut prefix = Vec::with_capacity(addr.len() + 1);
    prefix.extend_from_slice(addr.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Exclusive upper bound for a prefix scan (`|` + 1 is `}`).
fn make_prefix_end(address: &WalletAddress) -> Vec<u8> {
    let mut end = make_prefix(address);
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    end
}

fn decode<T: DeserializeOwned>(value: Option<AccessGuard<'_, &'static [u8]>>) -> StoreResult<Option<T>> {
    match value {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

// =============================================================================
// RedbStore
// =============================================================================

/// Embedded ACID store for identities, users, sessions and audit events.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLET_IDENTITIES)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(COUNTERS)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(ADDRESS_SESSIONS)?;
            let _ = write_txn.open_table(LOGIN_AUDIT)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Identity database opened");
        Ok(Self { db })
    }

    /// Open `DATABASE_FILE` inside a data directory.
    pub fn open_in_dir(data_dir: &Path) -> StoreResult<Self> {
        Self::open(&data_dir.join(DATABASE_FILE))
    }

    /// Allocate the next user id inside an open write transaction.
    fn allocate_user_id(txn: &WriteTransaction) -> StoreResult<u64> {
        let mut counters = txn.open_table(COUNTERS)?;
        let next = counters.get(NEXT_USER_ID)?.map(|v| v.value()).unwrap_or(1);
        counters.insert(NEXT_USER_ID, next + 1)?;
        Ok(next)
    }
}

impl WalletIdentityStore for RedbStore {
    fn get_identity(&self, address: &WalletAddress) -> StoreResult<Option<WalletIdentity>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLET_IDENTITIES)?;
        decode(table.get(address.as_str())?)
    }

    fn find_by_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
    ) -> StoreResult<Option<WalletIdentity>> {
        Ok(self
            .get_identity(address)?
            .filter(|identity| identity.has_challenge(nonce)))
    }

    fn put_challenge(
        &self,
        address: &WalletAddress,
        challenge: &PendingChallenge,
    ) -> StoreResult<WalletIdentity> {
        let write_txn = self.db.begin_write()?;
        let identity = {
            let mut table = write_txn.open_table(WALLET_IDENTITIES)?;
            let mut identity: WalletIdentity = decode(table.get(address.as_str())?)?
                .unwrap_or_else(|| WalletIdentity::new(address.clone(), challenge.issued_at));
            identity.set_challenge(challenge);

            let json = serde_json::to_vec(&identity)?;
            table.insert(address.as_str(), json.as_slice())?;
            identity
        };
        write_txn.commit()?;
        Ok(identity)
    }

    fn consume_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ConsumedLogin>> {
        let write_txn = self.db.begin_write()?;
        let consumed = {
            let mut table = write_txn.open_table(WALLET_IDENTITIES)?;
            let current: Option<WalletIdentity> = decode(table.get(address.as_str())?)?;
            let mut identity = match current {
                Some(identity) if identity.has_challenge(nonce) => identity,
                // Dropping the transaction rolls it back
                _ => return Ok(None),
            };

            let (user_id, registered) = match identity.user_id {
                Some(id) => (id, false),
                None => {
                    let id = Self::allocate_user_id(&write_txn)?;
                    let user = UserRecord::for_address(id, address, now);
                    let mut users = write_txn.open_table(USERS)?;
                    users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
                    identity.user_id = Some(id);
                    (id, true)
                }
            };
            identity.clear_challenge(now);

            let json = serde_json::to_vec(&identity)?;
            table.insert(address.as_str(), json.as_slice())?;
            ConsumedLogin {
                identity,
                user_id,
                registered,
            }
        };
        write_txn.commit()?;
        Ok(Some(consumed))
    }

    fn get_user(&self, user_id: u64) -> StoreResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        decode(table.get(user_id)?)
    }

    fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(WALLET_IDENTITIES)?;
        Ok(())
    }
}

impl SessionStore for RedbStore {
    fn insert_session(&self, session: &SessionRecord) -> StoreResult<()> {
        let json = serde_json::to_vec(session)?;
        let index_key = make_index_key(
            &session.address,
            session.created_at.timestamp_micros(),
            &session.token_key,
        );

        let write_txn = self.db.begin_write()?;
        {
            let mut sessions = write_txn.open_table(SESSIONS)?;
            sessions.insert(session.token_key.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(ADDRESS_SESSIONS)?;
            index.insert(index_key.as_slice(), session.token_key.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_session(&self, token_key: &str) -> StoreResult<Option<SessionRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        decode(table.get(token_key)?)
    }

    fn revoke_session(
        &self,
        token_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>> {
        let write_txn = self.db.begin_write()?;
        let session = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let current: Option<SessionRecord> = decode(table.get(token_key)?)?;
            let mut session = match current {
                Some(session) => session,
                None => return Ok(None),
            };
            if session.revoked_at.is_none() {
                session.revoked_at = Some(at);
                let json = serde_json::to_vec(&session)?;
                table.insert(token_key, json.as_slice())?;
            }
            session
        };
        write_txn.commit()?;
        Ok(Some(session))
    }

    fn sessions_for_address(&self, address: &WalletAddress) -> StoreResult<Vec<SessionRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ADDRESS_SESSIONS)?;
        let sessions = read_txn.open_table(SESSIONS)?;

        let start = make_prefix(address);
        let end = make_prefix_end(address);

        let mut result = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let (_key, token_key) = entry?;
            if let Some(session) = decode(sessions.get(token_key.value())?)? {
                result.push(session);
            }
        }
        Ok(result)
    }
}

impl LoginAuditLog for RedbStore {
    fn append(&self, event: &LoginAuditEvent) -> StoreResult<()> {
        let json = serde_json::to_vec(event)?;
        let key = make_index_key(
            &event.address,
            event.timestamp.timestamp_micros(),
            &event.event_id,
        );

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(LOGIN_AUDIT)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn events_for(&self, address: &WalletAddress) -> StoreResult<Vec<LoginAuditEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LOGIN_AUDIT)?;

        let start = make_prefix(address);
        let end = make_prefix_end(address);

        let mut events = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let (_key, value) = entry?;
            events.push(serde_json::from_slice(value.value())?);
        }
        Ok(events)
    }
}
