//! A small time-to-live cache that is created and owned by its caller.
//!
//! There is no process-wide memoisation anywhere in this crate. Whatever needs
//! caching (exchange-rate lookups, for instance) receives a `TtlCache` and the
//! caller decides how long it lives.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Source of the current time, injectable so expiry can be tested.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// Key/value cache whose entries expire `ttl` after insertion.
///
/// An entry stored at `t` is fresh while `now - t < ttl`.
#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock> {
    entries: HashMap<K, Entry<V>>,
    ttl: Duration,
    clock: C,
}

impl<K: Eq + Hash, V> TtlCache<K, V, SystemClock> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K: Eq + Hash, V, C: Clock> TtlCache<K, V, C> {
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        TtlCache {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    pub fn insert(&mut self, key: K, value: V) {
        let stored_at = self.clock.now();
        self.entries.insert(key, Entry { value, stored_at });
    }

    /// Fresh value for `key`. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.clock.now();
        let fresh = self.entries.get(key).map(|e| self.is_fresh(e, now))?;
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    /// Return the fresh value for `key`, or run `load` and cache its result.
    ///
    /// A failed `load` leaves the cache untouched, so the next call retries.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, load: F) -> Result<&V, E>
    where
        K: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        if self.get(&key).is_none() {
            let value = load()?;
            self.insert(key.clone(), value);
        }
        // The entry was either fresh above or just inserted.
        Ok(&self.entries[&key].value)
    }

    pub fn invalidate(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
