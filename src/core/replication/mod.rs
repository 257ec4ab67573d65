// src/core/replication/mod.rs
//
// Cross-region replication loop for globally-scoped entity kinds (policies,
// roles, namespaces) on a non-authoritative region (spec.md §4.7): list the
// kind from the authoritative region with allow-stale and a blocking
// min_query_index, diff against local state, get the update set, and apply
// both deletions and upserts via local Raft. Grounded on the
// reconnect/backoff loop in `core::replication::worker::ReplicaWorker::run`,
// generalized from a single primary-to-replica command stream to a
// poll-diff-apply cycle over three entity kinds.

use crate::core::domain::{Namespace, Policy, PolicyName, Role, RoleId};
use crate::core::errors::OrchResult;
use crate::core::metrics;
use crate::core::raft::{raft_apply, requests::RaftRequest, RaftHandle};
use crate::core::rate_limit::RateLimiter;
use crate::core::state_store::StateStore;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn content_hash<T: serde::Serialize>(value: &T) -> u64 {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// The authoritative-region client this loop drives. The concrete RPC
/// client (dialing the authoritative region's servers, applying
/// `allow-stale=true` and blocking `min_query_index`) is an external
/// collaborator — out of scope the same way the region/leader forward
/// transport is (see `core::forwarding::transport`).
#[async_trait]
pub trait ReplicationSource: Send + Sync {
    async fn list_policies(&self, min_query_index: u64) -> OrchResult<(Vec<Policy>, u64)>;
    async fn list_roles(&self, min_query_index: u64) -> OrchResult<(Vec<Role>, u64)>;
    async fn list_namespaces(&self, min_query_index: u64) -> OrchResult<(Vec<Namespace>, u64)>;
}

/// A `ReplicationSource` that always reports a transient failure. The
/// concrete authoritative-region RPC client is an external collaborator
/// (spec.md §1); this stand-in lets the loop, its rate limiter and its
/// backoff run end-to-end on a non-authoritative region before a real
/// client is wired in, the same way `forwarding::transport::dial_and_send`
/// stands in for the real forward transport.
pub struct UnimplementedReplicationSource;

#[async_trait]
impl ReplicationSource for UnimplementedReplicationSource {
    async fn list_policies(&self, _min_query_index: u64) -> OrchResult<(Vec<Policy>, u64)> {
        Err(crate::core::errors::OrchError::Transient(
            "no authoritative-region replication client configured".into(),
        ))
    }

    async fn list_roles(&self, _min_query_index: u64) -> OrchResult<(Vec<Role>, u64)> {
        Err(crate::core::errors::OrchError::Transient(
            "no authoritative-region replication client configured".into(),
        ))
    }

    async fn list_namespaces(&self, _min_query_index: u64) -> OrchResult<(Vec<Namespace>, u64)> {
        Err(crate::core::errors::OrchError::Transient(
            "no authoritative-region replication client configured".into(),
        ))
    }
}

pub struct ReplicationLoop {
    source: Arc<dyn ReplicationSource>,
    raft: Arc<dyn RaftHandle>,
    store: StateStore,
    limiter: RateLimiter,
}

impl ReplicationLoop {
    pub fn new(source: Arc<dyn ReplicationSource>, raft: Arc<dyn RaftHandle>, store: StateStore) -> Self {
        Self {
            source,
            raft,
            store,
            limiter: RateLimiter::new(30, Duration::from_secs(60), 10),
        }
    }

    /// Runs all three per-kind loops concurrently until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let policies = tokio::spawn(self.clone().run_policies(cancel.clone()));
        let roles = tokio::spawn(self.clone().run_roles(cancel.clone()));
        let namespaces = tokio::spawn(self.clone().run_namespaces(cancel));
        let _ = tokio::join!(policies, roles, namespaces);
    }

    async fn run_policies(self: Arc<Self>, cancel: CancellationToken) {
        let mut min_query_index = 0u64;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            if !self.limiter.try_acquire() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            match self.source.list_policies(min_query_index).await {
                Ok((remote, resp_index)) => {
                    backoff = INITIAL_BACKOFF;
                    let local = self.store.list_policies();
                    let (deletes, upserts) = diff(&local, &remote, |p| p.name.clone());
                    self.apply_policy_diff(deletes, upserts, resp_index).await;
                    metrics::REPLICATION_LAG
                        .with_label_values(&["policies"])
                        .set(resp_index.saturating_sub(min_query_index) as f64);
                    min_query_index = resp_index;
                }
                Err(e) => {
                    warn!("policy replication list failed: {e}");
                    self.backoff_and_reset(&mut backoff, &cancel).await;
                }
            }
        }
    }

    async fn run_roles(self: Arc<Self>, cancel: CancellationToken) {
        let mut min_query_index = 0u64;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            if !self.limiter.try_acquire() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            match self.source.list_roles(min_query_index).await {
                Ok((remote, resp_index)) => {
                    backoff = INITIAL_BACKOFF;
                    let local = self.store.list_roles();
                    let (deletes, upserts) = diff(&local, &remote, |r| r.id.clone());
                    self.apply_role_diff(deletes, upserts, resp_index).await;
                    metrics::REPLICATION_LAG
                        .with_label_values(&["roles"])
                        .set(resp_index.saturating_sub(min_query_index) as f64);
                    min_query_index = resp_index;
                }
                Err(e) => {
                    warn!("role replication list failed: {e}");
                    self.backoff_and_reset(&mut backoff, &cancel).await;
                }
            }
        }
    }

    async fn run_namespaces(self: Arc<Self>, cancel: CancellationToken) {
        let mut min_query_index = 0u64;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            if !self.limiter.try_acquire() {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
            match self.source.list_namespaces(min_query_index).await {
                Ok((remote, resp_index)) => {
                    backoff = INITIAL_BACKOFF;
                    let local = self.store.namespaces.iter_values();
                    let (deletes, upserts) = diff(&local, &remote, |n| n.0.clone());
                    if !deletes.is_empty() {
                        if let Err(e) = raft_apply(
                            self.raft.as_ref(),
                            RaftRequest::ReplicateDeleteNamespaces(deletes),
                        )
                        .await
                        {
                            error!("namespace replication delete apply failed: {e}");
                        }
                    }
                    if !upserts.is_empty() {
                        if let Err(e) = raft_apply(
                            self.raft.as_ref(),
                            RaftRequest::ReplicateUpsertNamespaces(upserts),
                        )
                        .await
                        {
                            error!("namespace replication upsert apply failed: {e}");
                        }
                    }
                    metrics::REPLICATION_LAG
                        .with_label_values(&["namespaces"])
                        .set(resp_index.saturating_sub(min_query_index) as f64);
                    min_query_index = resp_index;
                }
                Err(e) => {
                    warn!("namespace replication list failed: {e}");
                    self.backoff_and_reset(&mut backoff, &cancel).await;
                }
            }
        }
    }

    async fn apply_policy_diff(&self, deletes: Vec<PolicyName>, upserts: Vec<Policy>, _resp_index: u64) {
        if !deletes.is_empty() {
            if let Err(e) =
                raft_apply(self.raft.as_ref(), RaftRequest::ReplicateDeletePolicies(deletes)).await
            {
                error!("policy replication delete apply failed: {e}");
            }
        }
        if !upserts.is_empty() {
            if let Err(e) =
                raft_apply(self.raft.as_ref(), RaftRequest::ReplicateUpsertPolicies(upserts)).await
            {
                error!("policy replication upsert apply failed: {e}");
            }
        }
    }

    async fn apply_role_diff(&self, deletes: Vec<RoleId>, upserts: Vec<Role>, _resp_index: u64) {
        if !deletes.is_empty() {
            if let Err(e) =
                raft_apply(self.raft.as_ref(), RaftRequest::ReplicateDeleteRoles(deletes)).await
            {
                error!("role replication delete apply failed: {e}");
            }
        }
        if !upserts.is_empty() {
            if let Err(e) =
                raft_apply(self.raft.as_ref(), RaftRequest::ReplicateUpsertRoles(upserts)).await
            {
                error!("role replication upsert apply failed: {e}");
            }
        }
    }

    /// On any error, back off and restart from the current local index —
    /// the loop's `min_query_index` is left untouched by the caller so the
    /// next attempt re-lists from where it last succeeded.
    async fn backoff_and_reset(&self, backoff: &mut Duration, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(*backoff) => {}
            _ = cancel.cancelled() => {}
        }
        *backoff = (*backoff * 2).min(MAX_BACKOFF);
    }
}

/// Computes the delete and upsert sets per spec.md §4.7's diff rule:
/// *delete* = locally-present keys absent remotely; *update* = remotely
/// present keys that are locally missing, or whose content hash differs
/// from the local copy's.
fn diff<T: Clone + serde::Serialize, K: Eq + std::hash::Hash + Clone>(
    local: &[T],
    remote: &[T],
    key_of: impl Fn(&T) -> K,
) -> (Vec<K>, Vec<T>) {
    use std::collections::HashMap;

    let local_by_key: HashMap<K, &T> = local.iter().map(|v| (key_of(v), v)).collect();
    let remote_by_key: HashMap<K, &T> = remote.iter().map(|v| (key_of(v), v)).collect();

    let deletes: Vec<K> = local_by_key
        .keys()
        .filter(|k| !remote_by_key.contains_key(*k))
        .cloned()
        .collect();

    let upserts: Vec<T> = remote
        .iter()
        .filter(|r| {
            let k = key_of(r);
            match local_by_key.get(&k) {
                None => true,
                Some(local_v) => content_hash(*local_v) != content_hash(r),
            }
        })
        .cloned()
        .collect();

    (deletes, upserts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::PolicyName;

    fn policy(name: &str, rules: &str) -> Policy {
        Policy {
            name: PolicyName(name.into()),
            rules: rules.into(),
            description: String::new(),
            indices: Default::default(),
        }
    }

    /// spec.md §4.7/§8 scenario 6: a policy present locally but absent from
    /// the authoritative region's listing is deleted, not left behind.
    #[test]
    fn diff_deletes_locally_present_keys_missing_remotely() {
        let local = vec![policy("a", "+@read"), policy("b", "+@read")];
        let remote = vec![policy("b", "+@read")];

        let (deletes, upserts) = diff(&local, &remote, |p| p.name.clone());

        assert_eq!(deletes, vec![PolicyName("a".into())]);
        assert!(upserts.is_empty());
    }

    #[test]
    fn diff_upserts_new_and_changed_remote_entries() {
        let local = vec![policy("a", "+@read")];
        let remote = vec![policy("a", "+@read +@write"), policy("b", "+@read")];

        let (deletes, upserts) = diff(&local, &remote, |p| p.name.clone());

        assert!(deletes.is_empty());
        let upserted_names: Vec<String> = upserts.iter().map(|p| p.name.0.clone()).collect();
        assert_eq!(upserted_names.len(), 2);
        assert!(upserted_names.contains(&"a".to_string()));
        assert!(upserted_names.contains(&"b".to_string()));
    }

    #[test]
    fn diff_is_noop_when_content_identical() {
        let local = vec![policy("a", "+@read")];
        let remote = vec![policy("a", "+@read")];

        let (deletes, upserts) = diff(&local, &remote, |p| p.name.clone());

        assert!(deletes.is_empty());
        assert!(upserts.is_empty());
    }
}
