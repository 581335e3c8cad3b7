// SPDX-License-Identifier: AGPL-3.0-or-later

//! Component B: the hash-keyed response cache (§3.4, §4.B). A bounded LRU
//! of `u64 → u16` with capacity-0 meaning "disabled". The cache does not
//! lock itself; callers hold a mutex (see [`crate::cache::SharedCache`])
//! around any sequence of operations that must be atomic.

use std::{
    hash::{Hash, Hasher},
    num::NonZeroUsize,
    sync::Mutex,
};

use lru::LruCache;

/// A bounded LRU keyed by a 64-bit hash, values are certitudes. Capacity 0
/// disables the cache: `get` always misses, `insert` is a no-op.
pub struct ResponseCache {
    inner: Option<LruCache<u64, u16>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(LruCache::new);
        Self { inner }
    }

    /// Returns the last-inserted certitude for `hash`, touching LRU order.
    pub fn get(&mut self, hash: u64) -> Option<u16> {
        self.inner.as_mut()?.get(&hash).copied()
    }

    /// Inserts `certitude` for `hash`, evicting the least-recently-used
    /// entry if at capacity. No-op when the cache is disabled.
    pub fn insert(&mut self, hash: u64, certitude: u16) {
        if let Some(cache) = self.inner.as_mut() {
            cache.put(hash, certitude);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `ResponseCache` behind the single external mutex the contract requires.
/// Classifiers call [`SharedCache::get_or_compute`] so the hold-lock /
/// compute-on-miss / insert sequence stays atomic across callers.
pub struct SharedCache {
    inner: Mutex<ResponseCache>,
}

impl SharedCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(ResponseCache::new(capacity)) }
    }

    pub fn get(&self, hash: u64) -> Option<u16> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).get(hash)
    }

    pub fn insert(&self, hash: u64, certitude: u16) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hash, certitude);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).is_enabled()
    }
}

/// Default hashing rule (§4.B): hash the raw request body bytes. Classifiers
/// that want custom keying call their own `hash_key` instead of this.
pub fn default_hash(body: &[u8]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    body.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_disables_cache() {
        let mut cache = ResponseCache::new(0);
        cache.insert(1, 99);
        assert_eq!(cache.get(1), None);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn get_after_insert_hits() {
        let mut cache = ResponseCache::new(4);
        cache.insert(1, 55);
        assert_eq!(cache.get(1), Some(55));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ResponseCache::new(2);
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.get(1);
        cache.insert(3, 3);
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(1), Some(1));
        assert_eq!(cache.get(3), Some(3));
    }

    #[test]
    fn shared_cache_is_mutex_guarded() {
        let shared = SharedCache::new(4);
        shared.insert(10, 77);
        assert_eq!(shared.get(10), Some(77));
    }

    #[test]
    fn default_hash_is_deterministic() {
        let body = b"[\"abc\"]";
        assert_eq!(default_hash(body), default_hash(body));
    }
}
