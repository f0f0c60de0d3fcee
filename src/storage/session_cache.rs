// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache for session lookups.
//!
//! Every authenticated request validates its bearer token; caching the
//! session row for a few seconds keeps that off the database. Entries are
//! keyed by token key and dropped on revocation in this process.
//!
//! A lookup that misses reads the store and then fills the cache. If a
//! revocation lands between the two, the row it read is stale, so fills
//! carry the [`Generation`] taken before the read and are dropped when any
//! invalidation happened since.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use super::records::SessionRecord;

/// Cached entry: the session row + insertion timestamp.
struct CacheEntry {
    session: SessionRecord,
    inserted_at: Instant,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// Bumped by every invalidation.
    generation: u64,
}

/// Invalidation count observed before a store read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Outcome of [`SessionCache::get`].
#[derive(Debug)]
pub enum Lookup {
    Hit(SessionRecord),
    Miss(Generation),
}

/// In-process LRU cache for hot session lookups.
pub struct SessionCache {
    inner: Mutex<Inner>,
    ttl: Duration,
}

impl SessionCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// Returns `None` when either is zero, which disables caching.
    pub fn new(capacity: usize, ttl: Duration) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        if ttl.is_zero() {
            return None;
        }
        Some(Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
            ttl,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached row, or the generation to hand back to [`put`](Self::put)
    /// once the store has been read.
    pub fn get(&self, token_key: &str) -> Lookup {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get(token_key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Lookup::Hit(entry.session.clone());
            }
            // Expired, drop it
            inner.entries.pop(token_key);
        }
        Lookup::Miss(Generation(inner.generation))
    }

    /// Cache a row read from the store. Refused if anything was invalidated
    /// after `seen` was taken.
    pub fn put(&self, session: SessionRecord, seen: Generation) -> bool {
        let mut inner = self.lock();
        if inner.generation != seen.0 {
            return false;
        }
        inner.entries.put(
            session.token_key.clone(),
            CacheEntry {
                session,
                inserted_at: Instant::now(),
            },
        );
        true
    }

    pub fn invalidate(&self, token_key: &str) {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        inner.entries.pop(token_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientMeta, WalletAddress};
    use chrono::Utc;

    fn sample_session(key: &str) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: "session-1".to_string(),
            token_key: key.to_string(),
            user_id: 1,
            address: WalletAddress::from("0x1111111111111111111111111111111111111111"),
            expires_at: now + chrono::Duration::hours(1),
            revoked_at: None,
            created_at: now,
            client: ClientMeta::default(),
        }
    }

    /// Miss, then fill with the generation the miss reported.
    fn fill(cache: &SessionCache, key: &str) -> bool {
        cache.put(sample_session(key), miss(cache, key))
    }

    fn miss(cache: &SessionCache, key: &str) -> Generation {
        match cache.get(key) {
            Lookup::Miss(seen) => seen,
            Lookup::Hit(_) => panic!("{key} unexpectedly cached"),
        }
    }

    fn is_hit(cache: &SessionCache, key: &str) -> bool {
        matches!(cache.get(key), Lookup::Hit(_))
    }

    #[test]
    fn cache_put_and_get() {
        let cache = SessionCache::new(10, Duration::from_secs(300)).unwrap();
        assert!(fill(&cache, "k1"));

        match cache.get("k1") {
            Lookup::Hit(session) => assert_eq!(session.id, "session-1"),
            Lookup::Miss(_) => panic!("expected a hit"),
        }
    }

    #[test]
    fn cache_invalidate() {
        let cache = SessionCache::new(10, Duration::from_secs(300)).unwrap();
        fill(&cache, "k1");
        assert!(is_hit(&cache, "k1"));

        cache.invalidate("k1");
        assert!(!is_hit(&cache, "k1"));
    }

    #[test]
    fn fill_after_invalidation_is_refused() {
        let cache = SessionCache::new(10, Duration::from_secs(300)).unwrap();
        let seen = miss(&cache, "k1");

        cache.invalidate("k1");
        assert!(!cache.put(sample_session("k1"), seen));
        assert!(!is_hit(&cache, "k1"));

        assert!(fill(&cache, "k1"));
    }

    #[test]
    fn cache_ttl_expiry() {
        let cache = SessionCache::new(10, Duration::from_millis(1)).unwrap();
        fill(&cache, "k1");

        // Wait for TTL to expire
        std::thread::sleep(Duration::from_millis(5));

        assert!(!is_hit(&cache, "k1"));
    }

    #[test]
    fn zero_capacity_or_ttl_disables_cache() {
        assert!(SessionCache::new(0, Duration::from_secs(30)).is_none());
        assert!(SessionCache::new(10, Duration::ZERO).is_none());
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = SessionCache::new(1, Duration::from_secs(300)).unwrap();
        fill(&cache, "k1");
        fill(&cache, "k2");
        assert!(!is_hit(&cache, "k1"));
        assert!(is_hit(&cache, "k2"));
    }
}
