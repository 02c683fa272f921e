//! TTL cache for aggregator quotes
//!
//! Expiry is checked lazily on `get`; `sweep` drops every expired entry at
//! once. Time comes from an injected `Clock` so tests control it.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Monotonic time source
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
    clock: C,
}

impl<K: Eq + Hash, V: Clone, C: Clock> TtlCache<K, V, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self { entries: HashMap::new(), ttl, clock }
    }

    fn is_stale(&self, entry: &Entry<V>) -> bool {
        self.clock.now().saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    /// Fresh value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let stale = self.is_stale(self.entries.get(key)?);
        if stale {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn set(&mut self, key: K, value: V) {
        let inserted_at = self.clock.now();
        self.entries.insert(key, Entry { value, inserted_at });
    }

    pub fn evict(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drop all expired entries, returning how many were removed
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
        before - self.entries.len()
    }

    /// Entries held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
