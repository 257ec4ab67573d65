// src/core/acl/cache.rs

//! The capability-set cache: keyed by a stable hash of the sorted compiled
//! policy-name list, evicted LRU. Grounded on the teacher's general approach
//! of pre-parsing config-level rules into an optimized in-memory form
//! (`AclEnforcer::new`), here paired with `lru::LruCache` for bounded memory.

use super::capability::CapabilitySet;
use crate::core::domain::PolicyName;
use crate::core::metrics;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;

const DEFAULT_CAPACITY: usize = 4096;

/// A stable, order-independent key derived from the set of policy names a
/// capability set was compiled from.
pub fn cache_key(mut policy_names: Vec<&PolicyName>) -> String {
    policy_names.sort();
    let mut hasher = Sha256::new();
    for name in policy_names {
        hasher.update(name.0.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

pub struct CapabilityCache {
    inner: Mutex<LruCache<String, CapabilitySet>>,
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CapabilityCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<CapabilitySet> {
        let mut inner = self.inner.lock();
        let hit = inner.get(key).cloned();
        if hit.is_some() {
            metrics::ACL_CACHE_HITS_TOTAL.inc();
        } else {
            metrics::ACL_CACHE_MISSES_TOTAL.inc();
        }
        hit
    }

    pub fn put(&self, key: String, value: CapabilitySet) {
        self.inner.lock().put(key, value);
    }
}
