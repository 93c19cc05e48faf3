//! TTL-bounded snapshot caches.
//!
//! A [`SnapshotCache`] maps a key (usually a rounded coordinate) to the
//! last good payload fetched for it. Entries are immutable [`Snapshot`]s
//! replaced atomically on refresh; concurrent refreshes of the same key
//! are allowed and the last writer wins, since every snapshot is a copy
//! of the same upstream truth.
//!
//! The clock is always passed in, so staleness is deterministic in tests.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// An immutable payload and the time it was fetched.
#[derive(Debug)]
pub struct Snapshot<T> {
    /// When the payload was fetched from upstream.
    pub fetched_at: DateTime<Utc>,
    /// The cached payload.
    pub payload: T,
}

impl<T> Snapshot<T> {
    /// Age of the snapshot at `now` (zero if `now` precedes the fetch).
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).max(Duration::zero())
    }

    /// Whether the snapshot is younger than `ttl` at `now`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) < ttl
    }
}

/// A keyed, TTL-bounded cache of [`Snapshot`]s.
#[derive(Debug)]
pub struct SnapshotCache<K, T> {
    ttl: Duration,
    entries: RwLock<BTreeMap<K, Arc<Snapshot<T>>>>,
}

impl<K: Ord + Clone, T> SnapshotCache<K, T> {
    /// Creates an empty cache whose entries are fresh for `ttl`.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `key` only if it is still fresh at `now`.
    #[must_use]
    pub fn fresh(&self, key: &K, now: DateTime<Utc>) -> Option<Arc<Snapshot<T>>> {
        self.any(key).filter(|s| s.is_fresh(self.ttl, now))
    }

    /// Returns the entry for `key` regardless of age.
    #[must_use]
    pub fn any(&self, key: &K) -> Option<Arc<Snapshot<T>>> {
        // A poisoned lock only means a writer panicked mid-insert; the map
        // itself still holds whole snapshots.
        let entries = self
            .entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Atomically replaces the entry for `key` and returns the new snapshot.
    pub fn replace(&self, key: K, payload: T, now: DateTime<Utc>) -> Arc<Snapshot<T>> {
        let snapshot = Arc::new(Snapshot {
            fetched_at: now,
            payload,
        });
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key, Arc::clone(&snapshot));
        snapshot
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn fresh_entries_expire_after_ttl() {
        let cache: SnapshotCache<String, u32> = SnapshotCache::new(Duration::minutes(30));
        cache.replace("a".to_string(), 1, t0());

        assert!(cache.fresh(&"a".to_string(), t0() + Duration::minutes(29)).is_some());
        assert!(cache.fresh(&"a".to_string(), t0() + Duration::minutes(30)).is_none());
        assert_eq!(cache.any(&"a".to_string()).unwrap().payload, 1);
    }

    #[test]
    fn replace_is_last_writer_wins() {
        let cache: SnapshotCache<&str, u32> = SnapshotCache::new(Duration::minutes(5));
        cache.replace("k", 1, t0());
        cache.replace("k", 2, t0() + Duration::minutes(1));

        let snap = cache.any(&"k").unwrap();
        assert_eq!(snap.payload, 2);
        assert_eq!(snap.fetched_at, t0() + Duration::minutes(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_key_is_none() {
        let cache: SnapshotCache<(), u32> = SnapshotCache::new(Duration::minutes(5));
        assert!(cache.is_empty());
        assert!(cache.any(&()).is_none());
        assert!(cache.fresh(&(), t0()).is_none());
    }

    #[test]
    fn snapshot_age_never_negative() {
        let snap = Snapshot {
            fetched_at: t0(),
            payload: (),
        };
        assert_eq!(snap.age(t0() - Duration::hours(1)), Duration::zero());
        assert_eq!(snap.age(t0() + Duration::hours(2)), Duration::hours(2));
    }
}
