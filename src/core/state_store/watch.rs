// src/core/state_store/watch.rs

//! Watch-set plumbing: a read collects `Arc<Notify>` handles for every
//! subject (table or row) it touched; the blocking query engine waits on all
//! of them at once. Mirrors the teacher's waiter-registration-then-release
//! pattern in `BlockerManager::orchestrate_blocking_pop`, but keyed by table
//! and row rather than by list key.

use std::sync::Arc;
use tokio::sync::{Notified, Notify};

/// A collection of change subscriptions gathered while running one read.
/// Becomes signalled the moment any subject it touched next mutates.
#[derive(Default, Clone)]
pub struct WatchSet {
    notifies: Vec<Arc<Notify>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&mut self, notify: Arc<Notify>) {
        self.notifies.push(notify);
    }

    pub fn merge(&mut self, other: WatchSet) {
        self.notifies.extend(other.notifies);
    }

    pub fn is_empty(&self) -> bool {
        self.notifies.is_empty()
    }

    /// Constructs (but does not await) one `Notified` listener per watched
    /// subject. Must be called before re-checking whatever condition decides
    /// whether to wait at all: `Notify::notify_waiters` only wakes listeners
    /// that already exist at the moment it's called, so a listener created
    /// after a commit's `notify_waiters()` call has already fired would sleep
    /// through that commit. Calling `arm()` first and checking the condition
    /// after means any commit landing in between is still observed, because
    /// the listener was already registered when it happened — it just hasn't
    /// been polled yet.
    pub fn arm(&self) -> ArmedWatch<'_> {
        ArmedWatch {
            futs: self.notifies.iter().map(|n| n.notified()).collect(),
        }
    }
}

/// Listeners registered against every subject a read touched, ready to be
/// awaited. See `WatchSet::arm`.
pub struct ArmedWatch<'a> {
    futs: Vec<Notified<'a>>,
}

impl<'a> ArmedWatch<'a> {
    pub fn is_empty(&self) -> bool {
        self.futs.is_empty()
    }

    /// Resolves as soon as any armed subject fires. Intended to be raced
    /// against a timeout by the caller.
    pub async fn wait(self) {
        if self.futs.is_empty() {
            // Nothing was armed — never resolve on our own; the caller's
            // timeout is the only way out. This happens for reads over an
            // empty table with no table-level notify registered yet, which
            // should not occur in practice since every table always has one.
            std::future::pending::<()>().await;
            return;
        }
        // Race every subject; the first one to fire wins.
        futures::future::select_all(self.futs).await;
    }
}
