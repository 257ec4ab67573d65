// src/core/state_store/tables.rs

//! Generic per-table storage: a concurrent map plus the table-index counter
//! and the notify fan-out used to signal watchers. One instance of `Table`
//! backs each table kind in `StateStore`.

use super::watch::WatchSet;
use crate::core::domain::Indexed;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// One replicated table: rows keyed by `K`, each carrying its own
/// `create_index`/`modify_index`, plus the table-wide index bumped on every
/// commit that touches any row.
pub struct Table<K, V> {
    rows: DashMap<K, V>,
    table_index: AtomicU64,
    table_notify: Arc<Notify>,
    row_notify: DashMap<K, Arc<Notify>>,
}

impl<K, V> Default for Table<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            rows: DashMap::new(),
            table_index: AtomicU64::new(0),
            table_notify: Arc::new(Notify::new()),
            row_notify: DashMap::new(),
        }
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Indexed,
{
    pub fn table_index(&self) -> u64 {
        self.table_index.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|r| r.clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter_values(&self) -> Vec<V> {
        self.rows.iter().map(|r| r.value().clone()).collect()
    }

    /// Registers the table and the row (if present) in `watch_set`.
    pub fn watch(&self, key: &K, watch_set: &mut WatchSet) {
        watch_set.watch(self.table_notify.clone());
        let notify = self
            .row_notify
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone();
        watch_set.watch(notify);
    }

    pub fn watch_table(&self, watch_set: &mut WatchSet) {
        watch_set.watch(self.table_notify.clone());
    }

    /// Upsert a row at `commit_index`. Preserves `create_index` if the row
    /// already existed; otherwise stamps both indices at `commit_index`.
    pub fn upsert(&self, key: K, mut value: V, commit_index: u64) {
        if let Some(existing) = self.rows.get(&key) {
            let mut indices = existing.indices();
            indices.touch(commit_index);
            *value.indices_mut() = indices;
        } else {
            *value.indices_mut() = crate::core::domain::Indices::new_at(commit_index);
        }
        self.rows.insert(key.clone(), value);
        self.bump(&key, commit_index);
    }

    /// Returns the removed row, if any.
    pub fn delete(&self, key: &K, commit_index: u64) -> Option<V> {
        let removed = self.rows.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.bump(key, commit_index);
        }
        removed
    }

    fn bump(&self, key: &K, commit_index: u64) {
        self.table_index.fetch_max(commit_index, Ordering::AcqRel);
        self.table_notify.notify_waiters();
        if let Some(notify) = self.row_notify.get(key) {
            notify.notify_waiters();
        }
        // Stop tracking rows nobody is waiting on anymore to bound memory.
        self.row_notify.retain(|_, n| Arc::strong_count(n) > 1);
    }
}
