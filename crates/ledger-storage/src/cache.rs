// ledger-storage/src/cache.rs

use ledger_core::Transaction;
use ledger_crypto::Hash;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Transaction cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached transactions
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1_000 }
    }
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded index from transaction hash to transaction.
///
/// Never a source of truth: a miss only means the caller has to fall back to
/// the pool or ledger. Clones share the same underlying cache.
#[derive(Clone)]
pub struct TransactionCache {
    cache: Arc<RwLock<FifoCache<Hash, Transaction>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TransactionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: Arc::new(RwLock::new(FifoCache::new(config.capacity))),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, hash: &Hash) -> Option<Transaction> {
        let found = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned();

        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put(&self, hash: Hash, tx: Transaction) {
        let evicted = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(hash, tx);

        if let Some(old) = evicted {
            tracing::trace!(hash = %old, "Evicted transaction from cache");
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(hash)
    }

    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn stats(&self) -> CacheStats {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: cache.evictions,
        }
    }
}

impl Default for TransactionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Insertion-ordered cache: when full, the oldest insert goes first.
/// Reads never reorder or evict.
struct FifoCache<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
    evictions: u64,
}

impl<K: Clone + std::hash::Hash + Eq, V> FifoCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
            evictions: 0,
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or overwrite; returns the evicted key, if any
    fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }

        // Overwrites keep their original queue position
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return None;
        }

        let mut evicted = None;
        if self.map.len() >= self.capacity {
            if let Some(old_key) = self.order.pop_front() {
                self.map.remove(&old_key);
                self.evictions += 1;
                evicted = Some(old_key);
            }
        }

        self.order.push_back(key.clone());
        self.map.insert(key, value);
        evicted
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}
