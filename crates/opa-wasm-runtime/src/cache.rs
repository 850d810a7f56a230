//! Compiled policy module cache.
//!
//! Compiling a policy is far more expensive than instantiating it, so a
//! [`PolicyRuntime`](crate::PolicyRuntime) keeps compiled modules in an LRU
//! keyed by the BLAKE3 hash of the module bytes. Only immutable compiled
//! code is shared; every session still gets its own store and memory.
//!
//! # Examples
//!
//! ```
//! use opa_wasm_runtime::cache::ModuleCache;
//!
//! let cache = ModuleCache::new(8);
//! let key = ModuleCache::key_for(b"\0asm\x01\0\0\0");
//! assert!(cache.get(&key).is_none());
//! assert_eq!(cache.stats().misses, 1);
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use wasmtime::Module;

/// Content hash of a policy module.
///
/// # Examples
///
/// ```
/// use opa_wasm_runtime::cache::ModuleCache;
///
/// let a = ModuleCache::key_for(b"module");
/// let b = ModuleCache::key_for(b"module");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string().len(), 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(blake3::Hash);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found a compiled module
    pub hits: u64,
    /// Lookups that did not
    pub misses: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or `None` before the first lookup.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

/// LRU cache of compiled policy modules.
///
/// `Send` and `Sync`; lookups lock an internal mutex.
pub struct ModuleCache {
    cache: Mutex<lru::LruCache<CacheKey, Module>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ModuleCache {
    /// Creates a cache holding up to `capacity` modules (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(lru::LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Hashes module bytes into a cache key.
    #[must_use]
    pub fn key_for(bytes: &[u8]) -> CacheKey {
        CacheKey(blake3::hash(bytes))
    }

    fn lock(&self) -> MutexGuard<'_, lru::LruCache<CacheKey, Module>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up a compiled module, refreshing its LRU position on a hit.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Module> {
        let module = self.lock().get(key).cloned();
        let counter = if module.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        module
    }

    /// Stores a compiled module, evicting the least recently used if full.
    pub fn insert(&self, key: CacheKey, module: Module) {
        let mut cache = self.lock();
        cache.put(key, module);
        tracing::debug!("Module cached: {} (cache size: {})", key, cache.len());
    }

    /// Returns `true` if `key` is cached. Does not touch LRU order or stats.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    /// Drops every cached module.
    pub fn clear(&self) {
        self.lock().clear();
        tracing::info!("Module cache cleared");
    }

    /// Number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached modules.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Lookup counters since creation.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Config, Engine};

    fn empty_module(engine: &Engine) -> Module {
        let wasm = wat::parse_str("(module)").unwrap();
        Module::new(engine, wasm).unwrap()
    }

    #[test]
    fn test_key_is_content_hash() {
        let key1 = ModuleCache::key_for(b"policy a");
        let key2 = ModuleCache::key_for(b"policy a");
        let key3 = ModuleCache::key_for(b"policy b");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ModuleCache::new(0);
        assert_eq!(cache.capacity(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_insert_get_and_stats() {
        let cache = ModuleCache::new(4);
        let engine = Engine::new(&Config::default()).unwrap();
        let key = ModuleCache::key_for(b"test");

        assert!(cache.get(&key).is_none());
        cache.insert(key, empty_module(&engine));
        assert!(cache.contains(&key));
        assert!(cache.get(&key).is_some());

        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
        assert_eq!(cache.stats().hit_rate(), Some(0.5));
        assert_eq!(CacheStats::default().hit_rate(), None);
    }

    #[test]
    fn test_lru_eviction_respects_access() {
        let cache = ModuleCache::new(2);
        let engine = Engine::new(&Config::default()).unwrap();

        let key1 = ModuleCache::key_for(b"1");
        let key2 = ModuleCache::key_for(b"2");
        let key3 = ModuleCache::key_for(b"3");

        cache.insert(key1, empty_module(&engine));
        cache.insert(key2, empty_module(&engine));
        assert!(cache.get(&key1).is_some());

        cache.insert(key3, empty_module(&engine));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key1));
        assert!(!cache.contains(&key2));
        assert!(cache.contains(&key3));
    }

    #[test]
    fn test_clear() {
        let cache = ModuleCache::new(2);
        let engine = Engine::new(&Config::default()).unwrap();
        cache.insert(ModuleCache::key_for(b"x"), empty_module(&engine));

        cache.clear();
        assert!(cache.is_empty());
    }
}
