// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for wallet identities, users, sessions and the login audit
//! trail. The authentication core only ever sees the capability traits
//! defined here, held as `Arc<dyn ...>`; which backend sits behind them is
//! decided once in `main.rs`.
//!
//! ## Backends
//!
//! - [`RedbStore`]: embedded ACID database (redb), the production backend.
//! - [`InMemoryStore`]: mutex-guarded maps for tests and `DATA_DIR=:memory:`.
//!
//! ## Atomicity
//!
//! [`WalletIdentityStore::consume_challenge`] is the one conditional write
//! the protocol depends on: it must clear the nonce only if it still equals
//! the expected value, and must do so atomically with respect to every
//! other `consume_challenge` and `put_challenge` on the same address.
//! Everything else is a single-row point operation.

use chrono::{DateTime, Utc};

use crate::models::WalletAddress;

pub mod audit;
pub mod database;
pub mod memory;
pub mod records;
pub mod session_cache;

pub use audit::{LoginAuditEvent, LoginAuditLog};
pub use database::RedbStore;
pub use memory::InMemoryStore;
pub use records::{ConsumedLogin, PendingChallenge, SessionRecord, UserRecord, WalletIdentity};
pub use session_cache::{Lookup, SessionCache};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// One row per address: the outstanding challenge, the bound user and the
/// last successful login.
pub trait WalletIdentityStore: Send + Sync {
    fn get_identity(&self, address: &WalletAddress) -> StoreResult<Option<WalletIdentity>>;

    /// Exact `(address, nonce)` match against the outstanding challenge.
    fn find_by_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
    ) -> StoreResult<Option<WalletIdentity>>;

    /// Create the row if missing and overwrite any outstanding challenge.
    /// Concurrent calls for one address are last-writer-wins.
    fn put_challenge(
        &self,
        address: &WalletAddress,
        challenge: &PendingChallenge,
    ) -> StoreResult<WalletIdentity>;

    /// Compare-and-clear the outstanding nonce.
    ///
    /// If the stored nonce equals `nonce`, clears it, binds a freshly
    /// created user when the address has none, sets `last_login_at = now`
    /// and returns the updated row. Otherwise changes nothing and returns
    /// `None`.
    fn consume_challenge(
        &self,
        address: &WalletAddress,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ConsumedLogin>>;

    fn get_user(&self, user_id: u64) -> StoreResult<Option<UserRecord>>;

    /// Cheap round trip used by readiness probes.
    fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Session rows keyed by the derived token key, never the raw token.
pub trait SessionStore: Send + Sync {
    fn insert_session(&self, session: &SessionRecord) -> StoreResult<()>;

    fn get_session(&self, token_key: &str) -> StoreResult<Option<SessionRecord>>;

    /// Set `revoked_at` if unset. Returns the row as stored afterwards, or
    /// `None` if no such session exists.
    fn revoke_session(
        &self,
        token_key: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<SessionRecord>>;

    /// All sessions ever issued to an address, oldest first.
    fn sessions_for_address(&self, address: &WalletAddress) -> StoreResult<Vec<SessionRecord>>;
}
