use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bounded TTL + LRU cache for read-query responses.
///
/// Expired entries are treated as absent on read. Once the capacity is
/// reached, inserting a new key evicts the least-recently-used entry
/// regardless of its remaining TTL; a hit refreshes recency. There is no
/// write invalidation on these read paths, so staleness is bounded purely by
/// the TTL.
pub struct ResponseCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Monotonic use counter; higher means more recently used.
    tick: u64,
}

struct CacheEntry {
    value: Value,
    expires_at: Instant,
    last_used: u64,
}

impl ResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&self, key: String, value: Value) {
        self.insert_at(key, value, Instant::now());
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Value> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return None,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }
        inner.tick += 1;
        let tick = inner.tick;
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    fn insert_at(&self, key: String, value: Value, now: Instant) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        let expires_at = now + self.ttl;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            // Drop expired entries first; evict by recency only if still full.
            inner.entries.retain(|_, e| e.expires_at > now);
            if inner.entries.len() >= self.capacity {
                if let Some(lru_key) = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone())
                {
                    inner.entries.remove(&lru_key);
                }
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                last_used: tick,
            },
        );
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }
}

/// Derives a fixed-width cache key from an operation name, its serialized
/// arguments, and the caller's privilege tier. The privilege tier is part of
/// the digest so admin-widened result sets can never be served from a key
/// shared with non-admin callers.
pub fn cache_key(operation: &str, args: &Value, is_admin: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(args.to_string().as_bytes());
    hasher.update(b":admin=");
    hasher.update(if is_admin { b"1" } else { b"0" });
    hex::encode(hasher.finalize())
}
