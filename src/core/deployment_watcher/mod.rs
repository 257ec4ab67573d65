// src/core/deployment_watcher/mod.rs
//
// Supervisor: maintains one watcher per active deployment, driven by its
// own blocking query against the deployments table. Spawns a watcher for
// every newly-active deployment, stops the watcher for every deployment
// that goes terminal or disappears. Grounded on `core::warden::mod::run`'s
// registry-of-monitors pattern (a `DashMap` of per-entity state plus a
// `JoinSet`/per-entity cancellation), generalized from one monitor per
// configured master to one watcher per active deployment discovered live.

pub mod batching;
pub mod state_machine;
pub mod watcher;

use crate::core::blocking::{self, QueryOptions, QueryResult};
use crate::core::deployment_watcher::batching::EvalBatcher;
use crate::core::deployment_watcher::watcher::DeploymentWatcher;
use crate::core::domain::{Deployment, DeploymentId, Namespace};
use crate::core::metrics;
use crate::core::raft::RaftHandle;
use crate::core::state_store::watch::WatchSet;
use crate::core::state_store::StateStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct ActiveWatcher {
    cancel: CancellationToken,
}

pub struct DeploymentWatcherSupervisor {
    store: StateStore,
    raft: Arc<dyn RaftHandle>,
    batcher: EvalBatcher,
    registry: Arc<DashMap<(Namespace, DeploymentId), ActiveWatcher>>,
}

impl DeploymentWatcherSupervisor {
    pub fn new(store: StateStore, raft: Arc<dyn RaftHandle>) -> Self {
        Self {
            batcher: EvalBatcher::spawn(raft.clone()),
            store,
            raft,
            registry: Arc::new(DashMap::new()),
        }
    }

    /// Runs until `cancel` fires. Drives a blocking query over the
    /// deployments table; on every wakeup, reconciles the watcher registry
    /// against the currently-active set.
    pub async fn run(self, cancel: CancellationToken) {
        let mut min_query_index = 0u64;
        loop {
            if cancel.is_cancelled() {
                self.stop_all();
                return;
            }

            let opts = QueryOptions {
                min_query_index,
                ..Default::default()
            };
            let (active, meta) = blocking::run(&self.store, opts, &cancel, |s| {
                let mut watch_set = WatchSet::new();
                s.watch_deployments_table(&mut watch_set);
                QueryResult {
                    payload: s.list_active_deployments(),
                    index: s.max_index(),
                    watch_set,
                }
            })
            .await;

            self.reconcile(active);
            min_query_index = meta.index.saturating_add(1);
        }
    }

    fn reconcile(&self, active: Vec<Deployment>) {
        let mut still_active = std::collections::HashSet::new();

        for dep in active {
            let key = (dep.namespace.clone(), dep.id.clone());
            still_active.insert(key.clone());
            if self.registry.contains_key(&key) {
                continue;
            }
            self.spawn_watcher(dep);
        }

        let stale: Vec<(Namespace, DeploymentId)> = self
            .registry
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| !still_active.contains(k))
            .collect();
        for key in stale {
            self.stop_watcher(&key);
        }
    }

    fn spawn_watcher(&self, dep: Deployment) {
        let cancel = CancellationToken::new();
        let key = (dep.namespace.clone(), dep.id.clone());
        let watcher = DeploymentWatcher::new(
            self.store.clone(),
            self.raft.clone(),
            self.batcher.clone(),
            dep.namespace,
            dep.id,
        );
        let task_cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(task_cancel).await });
        self.registry.insert(key.clone(), ActiveWatcher { cancel });
        metrics::DEPLOYMENT_WATCHERS_ACTIVE.set(self.registry.len() as f64);
        debug!(deployment = %key.1, "watcher spawned");
    }

    fn stop_watcher(&self, key: &(Namespace, DeploymentId)) {
        if let Some((_, watcher)) = self.registry.remove(key) {
            watcher.cancel.cancel();
            metrics::DEPLOYMENT_WATCHERS_ACTIVE.set(self.registry.len() as f64);
            debug!(deployment = %key.1, "watcher stopped");
        }
    }

    fn stop_all(&self) {
        let keys: Vec<_> = self.registry.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.stop_watcher(&key);
        }
        info!("deployment watcher supervisor stopped");
    }
}
