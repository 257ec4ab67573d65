// src/core/state_store/mod.rs

//! A single-writer, many-reader in-memory relational store. The Raft FSM is
//! the only committer; any number of readers consume snapshots concurrently.
//!
//! Grounded on the teacher's `core::database::Db` keyspace plus
//! `core::blocking::BlockerManager`'s waiter-registration idiom, generalized
//! from Redis-style single-key blocking to per-table/per-row watch sets over
//! a fixed catalogue of replicated tables.

pub mod tables;
pub mod watch;

use crate::core::domain::{
    Allocation, AllocId, Deployment, DeploymentId, EvalId, Evaluation, Job, JobId, Namespace,
    OneTimeToken, Policy, PolicyName, Role, RoleId, Token, TokenAccessor,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tables::Table;
use watch::WatchSet;

/// The fixed catalogue of replicated tables (spec.md §3 / SPEC_FULL.md §2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Jobs,
    Evaluations,
    Allocations,
    Deployments,
    Policies,
    Roles,
    Tokens,
    OneTimeTokens,
    Namespaces,
}

fn ns_key<T: std::fmt::Display>(namespace: &Namespace, id: &T) -> String {
    format!("{namespace}/{id}")
}

/// Outcome of consuming a one-time token secret (spec.md §8 boundary case).
pub enum OttExchangeResult {
    Ok(OneTimeToken),
    /// Present but past `expires_at` as of the request's `now` — removed
    /// from the table the same as a successful exchange, but reported as
    /// permission-denied rather than handed back as valid.
    Expired,
    NotFound,
}

/// The replicated tables backing the whole control plane. Cheap to clone
/// (every field is an `Arc`); the Raft FSM holds the single writable handle,
/// readers clone it freely to take snapshots.
#[derive(Clone, Default)]
pub struct StateStore {
    pub jobs: Arc<Table<String, Job>>,
    /// Prior versions of a job, archived on overwrite so the deployment
    /// watcher's rollback logic can find a stable version with a different
    /// spec hash. Keyed by `{namespace}/{id}#v{version}`; not a listed
    /// table kind in its own right (it's an auxiliary index over `jobs`).
    pub job_versions: Arc<Table<String, Job>>,
    pub evaluations: Arc<Table<String, Evaluation>>,
    pub allocations: Arc<Table<String, Allocation>>,
    pub deployments: Arc<Table<String, Deployment>>,
    pub policies: Arc<Table<PolicyName, Policy>>,
    pub roles: Arc<Table<RoleId, Role>>,
    pub tokens: Arc<Table<TokenAccessor, Token>>,
    pub one_time_tokens: Arc<Table<String, OneTimeToken>>,
    pub namespaces: Arc<Table<String, Namespace>>,
    /// The commit index at which ACL bootstrap last succeeded, 0 if it never
    /// has. Compared against the `<data-dir>/acl-bootstrap-reset` side
    /// channel to permit re-bootstrap (spec.md §6, §8).
    bootstrap_index: Arc<AtomicU64>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The index of the most recent commit to any table, used as a
    /// reply-index floor when a read touches nothing (spec.md §4.4).
    pub fn max_index(&self) -> u64 {
        [
            self.jobs.table_index(),
            self.job_versions.table_index(),
            self.evaluations.table_index(),
            self.allocations.table_index(),
            self.deployments.table_index(),
            self.policies.table_index(),
            self.roles.table_index(),
            self.tokens.table_index(),
            self.one_time_tokens.table_index(),
            self.namespaces.table_index(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Produces a read view. Readers consume it via the accessor methods
    /// below; writes continue to land on the same underlying tables because
    /// `StateStore` is just a bundle of `Arc<Table<_>>` handles — the
    /// "snapshot" contract is satisfied because every row carries its own
    /// `modify_index` and `Table::get` never observes a torn write (DashMap
    /// shards guarantee per-row atomicity).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.clone(),
            taken_at_index: self.max_index(),
        }
    }

    // --- Jobs ---
    /// Archives the previous current job (if any, and if its version
    /// actually differs) into `job_versions` before installing `job` as the
    /// new current version.
    pub fn upsert_job(&self, job: Job, commit_index: u64) {
        let key = ns_key(&job.namespace, &job.id);
        if let Some(prev) = self.jobs.get(&key) {
            if prev.version != job.version {
                let version_key = format!("{key}#v{}", prev.version);
                self.job_versions.upsert(version_key, prev, commit_index);
            }
        }
        self.jobs.upsert(key, job, commit_index);
    }

    /// All archived versions of a job, oldest first.
    pub fn list_job_versions(&self, ns: &Namespace, id: &JobId) -> Vec<Job> {
        let prefix = format!("{}#v", ns_key(ns, id));
        let mut versions: Vec<Job> = self
            .job_versions
            .iter_values()
            .into_iter()
            .filter(|j| format!("{}#v{}", ns_key(&j.namespace, &j.id), j.version).starts_with(&prefix))
            .collect();
        versions.sort_by_key(|j| j.version);
        versions
    }

    /// The most recent prior version of `id` that is `stable` and whose
    /// spec hash differs from `current_spec_hash`, if one exists — used by
    /// the deployment watcher's rollback-on-unhealthy logic.
    pub fn find_prior_stable_version(
        &self,
        ns: &Namespace,
        id: &JobId,
        current_spec_hash: u64,
    ) -> Option<Job> {
        self.list_job_versions(ns, id)
            .into_iter()
            .rev()
            .find(|j| j.stable && j.spec_hash() != current_spec_hash)
    }

    pub fn get_job(&self, ns: &Namespace, id: &JobId) -> Option<Job> {
        self.jobs.get(&ns_key(ns, id))
    }

    pub fn watch_job(&self, ns: &Namespace, id: &JobId, watch_set: &mut WatchSet) {
        self.jobs.watch(&ns_key(ns, id), watch_set);
    }

    pub fn list_jobs(&self, ns: &Namespace) -> Vec<Job> {
        let prefix = format!("{ns}/");
        self.jobs
            .iter_values()
            .into_iter()
            .filter(|j| ns_key(&j.namespace, &j.id).starts_with(&prefix))
            .collect()
    }

    // --- Evaluations ---
    pub fn upsert_evaluation(&self, eval: Evaluation, commit_index: u64) {
        let key = ns_key(&eval.namespace, &eval.id);
        self.evaluations.upsert(key, eval, commit_index);
    }

    pub fn get_evaluation(&self, ns: &Namespace, id: &EvalId) -> Option<Evaluation> {
        self.evaluations.get(&ns_key(ns, id))
    }

    // --- Allocations ---
    pub fn upsert_allocation(&self, alloc: Allocation, commit_index: u64) {
        let key = ns_key(&alloc.namespace, &alloc.id);
        self.allocations.upsert(key, alloc, commit_index);
    }

    pub fn get_allocation(&self, ns: &Namespace, id: &AllocId) -> Option<Allocation> {
        self.allocations.get(&ns_key(ns, id))
    }

    pub fn allocations_for_deployment(&self, ns: &Namespace, dep: &DeploymentId) -> Vec<Allocation> {
        self.allocations
            .iter_values()
            .into_iter()
            .filter(|a| &a.namespace == ns && a.deployment_id.as_ref() == Some(dep))
            .collect()
    }

    // --- Deployments ---
    pub fn upsert_deployment(&self, dep: Deployment, commit_index: u64) {
        let key = ns_key(&dep.namespace, &dep.id);
        self.deployments.upsert(key, dep, commit_index);
    }

    pub fn get_deployment(&self, ns: &Namespace, id: &DeploymentId) -> Option<Deployment> {
        self.deployments.get(&ns_key(ns, id))
    }

    pub fn watch_deployments_table(&self, watch_set: &mut WatchSet) {
        self.deployments.watch_table(watch_set);
    }

    pub fn list_active_deployments(&self) -> Vec<Deployment> {
        self.deployments
            .iter_values()
            .into_iter()
            .filter(|d| d.is_active())
            .collect()
    }

    // --- Policies (global) ---
    pub fn upsert_policy(&self, policy: Policy, commit_index: u64) {
        self.policies.upsert(policy.name.clone(), policy, commit_index);
    }

    pub fn delete_policy(&self, name: &PolicyName, commit_index: u64) -> Option<Policy> {
        self.policies.delete(name, commit_index)
    }

    pub fn get_policy(&self, name: &PolicyName) -> Option<Policy> {
        self.policies.get(name)
    }

    pub fn list_policies(&self) -> Vec<Policy> {
        self.policies.iter_values()
    }

    // --- Roles (global) ---
    pub fn upsert_role(&self, role: Role, commit_index: u64) {
        self.roles.upsert(role.id.clone(), role, commit_index);
    }

    pub fn delete_role(&self, id: &RoleId, commit_index: u64) -> Option<Role> {
        self.roles.delete(id, commit_index)
    }

    pub fn get_role(&self, id: &RoleId) -> Option<Role> {
        self.roles.get(id)
    }

    pub fn get_role_by_name(&self, name: &str) -> Option<Role> {
        self.roles.iter_values().into_iter().find(|r| r.name.0 == name)
    }

    pub fn list_roles(&self) -> Vec<Role> {
        self.roles.iter_values()
    }

    // --- Tokens (global) ---
    pub fn upsert_token(&self, token: Token, commit_index: u64) {
        self.tokens.upsert(token.accessor.clone(), token, commit_index);
    }

    pub fn delete_token(&self, accessor: &TokenAccessor, commit_index: u64) -> Option<Token> {
        self.tokens.delete(accessor, commit_index)
    }

    pub fn get_token(&self, accessor: &TokenAccessor) -> Option<Token> {
        self.tokens.get(accessor)
    }

    pub fn list_tokens(&self) -> Vec<Token> {
        self.tokens.iter_values()
    }

    /// The commit index of the last successful ACL bootstrap, 0 if none yet.
    pub fn bootstrap_index(&self) -> u64 {
        self.bootstrap_index.load(Ordering::Acquire)
    }

    pub fn set_bootstrap_index(&self, commit_index: u64) {
        self.bootstrap_index.store(commit_index, Ordering::Release);
    }

    // --- One-time tokens ---
    pub fn upsert_one_time_token(&self, ott: OneTimeToken, commit_index: u64) {
        self.one_time_tokens
            .upsert(ott.one_time_secret.clone(), ott, commit_index);
    }

    /// Atomic delete-and-return, used by `ExchangeOneTimeToken` — the secret
    /// is consumed exactly once even under concurrent callers, because
    /// `DashMap::remove` is the single linearization point. An expired OTT is
    /// still removed (it's garbage either way) but reported distinctly from
    /// a missing one: expired resolves as permission-denied, missing as
    /// not-found (spec.md §8).
    pub fn exchange_one_time_token(
        &self,
        secret: &str,
        now: chrono::DateTime<chrono::Utc>,
        commit_index: u64,
    ) -> OttExchangeResult {
        match self.one_time_tokens.delete(&secret.to_string(), commit_index) {
            None => OttExchangeResult::NotFound,
            Some(ott) if ott.is_expired_at(now) => OttExchangeResult::Expired,
            Some(ott) => OttExchangeResult::Ok(ott),
        }
    }

    pub fn expire_one_time_tokens(&self, now: chrono::DateTime<chrono::Utc>, commit_index: u64) -> usize {
        let expired: Vec<String> = self
            .one_time_tokens
            .iter_values()
            .into_iter()
            .filter(|t| t.is_expired_at(now))
            .map(|t| t.one_time_secret.clone())
            .collect();
        for secret in &expired {
            self.one_time_tokens.delete(secret, commit_index);
        }
        expired.len()
    }

    // --- Namespaces (global) ---
    pub fn upsert_namespace(&self, ns: Namespace, commit_index: u64) {
        self.namespaces.upsert(ns.0.clone(), ns, commit_index);
    }

    pub fn namespace_exists(&self, name: &str) -> bool {
        self.namespaces.contains(&name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::TokenAccessor;

    #[test]
    fn bootstrap_index_starts_at_zero_and_tracks_last_set() {
        let store = StateStore::new();
        assert_eq!(store.bootstrap_index(), 0);
        store.set_bootstrap_index(7);
        assert_eq!(store.bootstrap_index(), 7);
    }

    #[test]
    fn exchange_one_time_token_distinguishes_expired_missing_and_live() {
        let store = StateStore::new();
        let now = chrono::Utc::now();

        assert!(matches!(
            store.exchange_one_time_token("absent", now, 1),
            OttExchangeResult::NotFound
        ));

        store.upsert_one_time_token(
            OneTimeToken {
                one_time_secret: "live".into(),
                accessor_id: TokenAccessor("acc-1".into()),
                expires_at: now + chrono::Duration::seconds(60),
            },
            2,
        );
        assert!(matches!(
            store.exchange_one_time_token("live", now, 3),
            OttExchangeResult::Ok(_)
        ));
        // Consumed: a repeat exchange sees it as gone, not expired.
        assert!(matches!(
            store.exchange_one_time_token("live", now, 4),
            OttExchangeResult::NotFound
        ));

        store.upsert_one_time_token(
            OneTimeToken {
                one_time_secret: "stale".into(),
                accessor_id: TokenAccessor("acc-2".into()),
                expires_at: now - chrono::Duration::seconds(1),
            },
            5,
        );
        assert!(matches!(
            store.exchange_one_time_token("stale", now, 6),
            OttExchangeResult::Expired
        ));
    }

    #[tokio::test]
    async fn watch_job_notifies_on_upsert() {
        let store = StateStore::new();
        let ns = Namespace::default_namespace();
        let id = JobId("web".into());
        let job = Job {
            id: id.clone(),
            namespace: ns.clone(),
            name: "web".into(),
            version: 0,
            priority: 50,
            node_pool: "default".into(),
            task_groups: vec![],
            meta: std::collections::HashMap::new(),
            stable: true,
            indices: Default::default(),
        };
        store.upsert_job(job.clone(), 1);

        let mut watch_set = WatchSet::new();
        store.watch_job(&ns, &id, &mut watch_set);
        let armed = watch_set.arm();
        assert!(!armed.is_empty());

        store.upsert_job(job, 2);
        // The notify fired synchronously inside `upsert`; the armed listener
        // observes it even though it hasn't been polled yet.
        let wait = armed.wait();
        tokio::pin!(wait);
        assert!(
            futures::poll!(wait).is_ready(),
            "listener armed before the write must observe it"
        );
    }
}

/// An immutable read view taken at a point in time. See `StateStore::snapshot`
/// for the concurrency argument behind why a cheap `Arc` bundle is sufficient
/// here instead of a persistent copy-on-write tree.
#[derive(Clone)]
pub struct Snapshot {
    store: StateStore,
    taken_at_index: u64,
}

impl Snapshot {
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn taken_at_index(&self) -> u64 {
        self.taken_at_index
    }
}
