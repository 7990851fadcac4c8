//! Time-bounded in-memory store for provider responses.
//!
//! There is no background sweeper: an expired entry stays in the map until
//! the next lookup for its key removes it. The entry count is bounded by
//! saved locations times endpoints, so this never grows large.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    time::{Duration, Instant},
};

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    payload: V,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Reusable only while `now - inserted_at < ttl`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) < self.ttl
    }

    pub fn payload(&self) -> &V {
        &self.payload
    }

    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[derive(Debug)]
pub struct ResponseCache<K, V, C = SystemClock> {
    entries: HashMap<K, CacheEntry<V>>,
    clock: C,
}

impl<K, V> ResponseCache<K, V, SystemClock>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, V> Default for ResponseCache<K, V, SystemClock>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> ResponseCache<K, V, C>
where
    K: Eq + Hash + Debug,
    V: Clone,
    C: Clock,
{
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
        }
    }

    /// Fresh payload for `key`. An expired entry is evicted and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                tracing::debug!(?key, "cache hit");
                Some(entry.payload.clone())
            }
            Some(_) => {
                tracing::debug!(?key, "cache entry expired");
                self.entries.remove(key);
                None
            }
            None => {
                tracing::debug!(?key, "cache miss");
                None
            }
        }
    }

    pub fn put(&mut self, key: K, payload: V, ttl: Duration) {
        let entry = CacheEntry {
            payload,
            inserted_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(key, entry);
    }

    /// Returns whether an entry (fresh or not) was removed.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
