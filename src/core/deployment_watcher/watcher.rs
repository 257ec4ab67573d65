// src/core/deployment_watcher/watcher.rs
//
// Per-deployment watcher. Owns nothing persistent; every decision is
// re-derived from the state store on each tick. Grounded on
// `core::warden::worker::MasterMonitor::run_tick_loop` — a periodic-tick
// driver over a piece of replicated state, generalized from master health
// polling to deployment progress tracking.

use crate::core::deployment_watcher::batching::EvalBatcher;
use crate::core::domain::{Deployment, DeploymentId, EvalTrigger, Namespace};
use crate::core::raft::{raft_apply, requests::RaftRequest, RaftHandle};
use crate::core::state_store::StateStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often a watcher re-evaluates its deployment between blocking-query
/// wakeups, bounding staleness even if a write's watch notification is missed.
const TICK_INTERVAL: Duration = Duration::from_secs(2);

pub struct DeploymentWatcher {
    store: StateStore,
    raft: Arc<dyn RaftHandle>,
    batcher: EvalBatcher,
    namespace: Namespace,
    deployment_id: DeploymentId,
    /// Last-observed per-task-group unhealthy count, kept only to detect a
    /// fresh unhealthy transition across ticks — never authoritative, never
    /// persisted, rebuilt from scratch if the watcher is respawned.
    last_unhealthy: HashMap<String, u32>,
}

impl DeploymentWatcher {
    pub fn new(
        store: StateStore,
        raft: Arc<dyn RaftHandle>,
        batcher: EvalBatcher,
        namespace: Namespace,
        deployment_id: DeploymentId,
    ) -> Self {
        Self {
            store,
            raft,
            batcher,
            namespace,
            deployment_id,
            last_unhealthy: HashMap::new(),
        }
    }

    /// Runs until the deployment goes terminal/absent or `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(deployment = %self.deployment_id, "watcher stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let Some(dep) = self.store.get_deployment(&self.namespace, &self.deployment_id) else {
                        debug!(deployment = %self.deployment_id, "watcher exiting: deployment absent");
                        return;
                    };
                    if !dep.is_active() {
                        debug!(deployment = %self.deployment_id, "watcher exiting: deployment terminal");
                        return;
                    }
                    if let Err(e) = self.evaluate(dep).await {
                        warn!(deployment = %self.deployment_id, "watcher tick failed: {e}");
                    }
                }
            }
        }
    }

    async fn evaluate(&mut self, dep: Deployment) -> crate::core::errors::OrchResult<()> {
        if self.detect_new_unhealthy(&dep) {
            self.rollback_on_unhealthy(&dep).await?;
            return Ok(());
        }
        if let Some(description) = self.check_progress_deadline(&dep) {
            self.fail(description).await?;
            // Exactly one evaluation per deployment failure (spec.md §8 scenario 2).
            self.batcher
                .notify(self.namespace.clone(), dep.job_id.clone(), EvalTrigger::DeploymentWatcher);
            return Ok(());
        }
        self.check_auto_promotion(&dep).await?;
        Ok(())
    }

    /// True iff any `auto_revert` task group's unhealthy count grew since
    /// the last tick — the trigger for rollback-on-unhealthy (spec.md §4.6.2).
    fn detect_new_unhealthy(&mut self, dep: &Deployment) -> bool {
        let mut triggered = false;
        for (name, tg) in &dep.task_groups {
            let prev = self.last_unhealthy.get(name).copied().unwrap_or(0);
            if tg.auto_revert && tg.unhealthy_allocs > prev {
                triggered = true;
            }
            self.last_unhealthy.insert(name.clone(), tg.unhealthy_allocs);
        }
        triggered
    }

    /// Returns `Some(failure description)` when the progress deadline has
    /// been exceeded for at least one not-done task group (spec.md §4.6.1).
    fn check_progress_deadline(&self, dep: &Deployment) -> Option<String> {
        if dep.needs_promotion() {
            // Waiting on operator promotion: the deadline is suspended.
            return None;
        }

        let allocs = self.store.allocations_for_deployment(&self.namespace, &dep.id);
        let latest_alloc_modify = allocs
            .iter()
            .filter_map(|a| a.deployment_status.as_ref().map(|s| s.timestamp))
            .max();

        let any_not_done = dep.task_groups.values().any(|tg| !tg.is_done());
        if !any_not_done {
            return None;
        }

        let cutoff = dep
            .task_groups
            .values()
            .filter(|tg| !tg.is_done())
            .map(|tg| tg.require_progress_by)
            .chain(latest_alloc_modify)
            .max()?;

        if Utc::now() > cutoff {
            Some("progress deadline exceeded".to_string())
        } else {
            None
        }
    }

    async fn check_auto_promotion(&self, dep: &Deployment) -> crate::core::errors::OrchResult<()> {
        let auto_promote_groups: Vec<&String> = dep
            .task_groups
            .iter()
            .filter(|(_, tg)| tg.auto_promote && !tg.promoted)
            .map(|(name, _)| name)
            .collect();
        if auto_promote_groups.is_empty() {
            return Ok(());
        }

        // All-or-nothing at the deployment level: every task group with
        // canaries must have its canaries healthy before any is promoted.
        let all_canaries_healthy = dep
            .task_groups
            .values()
            .filter(|tg| tg.desired_canaries > 0)
            .all(|tg| tg.canaries_healthy());
        if !all_canaries_healthy {
            return Ok(());
        }

        raft_apply(
            self.raft.as_ref(),
            RaftRequest::Promote {
                namespace: self.namespace.clone(),
                deployment_id: dep.id.clone(),
                all: true,
                task_groups: vec![],
            },
        )
        .await?;
        Ok(())
    }

    async fn rollback_on_unhealthy(&self, dep: &Deployment) -> crate::core::errors::OrchResult<()> {
        let result = match self.store.get_job(&self.namespace, &dep.job_id) {
            None => self.fail("failed allocations".to_string()).await,
            Some(job) => match self
                .store
                .find_prior_stable_version(&self.namespace, &dep.job_id, job.spec_hash())
            {
                Some(prior) => {
                    raft_apply(
                        self.raft.as_ref(),
                        RaftRequest::RollbackDeployment {
                            namespace: self.namespace.clone(),
                            deployment_id: dep.id.clone(),
                            job_id: dep.job_id.clone(),
                            reverted_to_version: Some(prior.version),
                            status_description: format!(
                                "failed allocations (rollback to version {})",
                                prior.version
                            ),
                        },
                    )
                    .await
                    .map(|_| ())
                }
                None => self.fail("failed allocations".to_string()).await,
            },
        };
        result?;
        // Exactly one evaluation per rollback/fail decision, win or lose the
        // race against a concurrent terminal transition.
        self.batcher
            .notify(self.namespace.clone(), dep.job_id.clone(), EvalTrigger::DeploymentWatcher);
        Ok(())
    }

    async fn fail(&self, description: String) -> crate::core::errors::OrchResult<()> {
        raft_apply(
            self.raft.as_ref(),
            RaftRequest::FailDeployment {
                namespace: self.namespace.clone(),
                deployment_id: self.deployment_id.clone(),
                status_description: description,
            },
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{DeploymentStatusKind, DeploymentTaskGroup, Job, JobId, TaskGroup};
    use crate::core::raft::SingleNodeRaft;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap as StdHashMap;

    fn task_group(require_progress_by: chrono::DateTime<Utc>) -> DeploymentTaskGroup {
        DeploymentTaskGroup {
            desired_total: 2,
            desired_canaries: 0,
            placed_allocs: 1,
            placed_canaries: 0,
            healthy_allocs: 1,
            unhealthy_allocs: 0,
            promoted: false,
            auto_promote: false,
            auto_revert: false,
            progress_deadline: Duration::from_secs(10),
            require_progress_by,
        }
    }

    fn deployment(ns: &Namespace, job_id: &JobId, task_groups: StdHashMap<String, DeploymentTaskGroup>) -> Deployment {
        Deployment {
            id: DeploymentId("dep-1".into()),
            namespace: ns.clone(),
            job_id: job_id.clone(),
            job_version: 0,
            status: DeploymentStatusKind::Running,
            status_description: String::new(),
            task_groups,
            indices: Default::default(),
        }
    }

    fn harness(store: StateStore) -> (Arc<dyn RaftHandle>, EvalBatcher) {
        let raft: Arc<dyn RaftHandle> = Arc::new(SingleNodeRaft::new(store));
        let batcher = EvalBatcher::spawn(raft.clone());
        (raft, batcher)
    }

    fn evaluations_for(store: &StateStore, job_id: &JobId) -> usize {
        store
            .evaluations
            .iter_values()
            .into_iter()
            .filter(|e| &e.job_id == job_id)
            .count()
    }

    /// spec.md §8 scenario 2: a not-done task group past its progress
    /// deadline fails the deployment and creates exactly one evaluation.
    #[tokio::test]
    async fn progress_deadline_exceeded_fails_and_creates_one_evaluation() {
        let store = StateStore::new();
        let ns = Namespace::default_namespace();
        let job_id = JobId("web".into());
        let (raft, batcher) = harness(store.clone());

        let mut groups = StdHashMap::new();
        groups.insert("web".to_string(), task_group(Utc::now() - ChronoDuration::seconds(5)));
        let dep = deployment(&ns, &job_id, groups);
        store.upsert_deployment(dep.clone(), 1);

        let mut watcher = DeploymentWatcher::new(store.clone(), raft, batcher, ns.clone(), dep.id.clone());
        watcher.evaluate(dep.clone()).await.unwrap();

        let reloaded = store.get_deployment(&ns, &dep.id).unwrap();
        assert_eq!(reloaded.status, DeploymentStatusKind::Failed);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(evaluations_for(&store, &job_id), 1);
    }

    /// spec.md §8 scenario 4: a fresh unhealthy transition on an
    /// `auto_revert` task group with a prior stable version rolls the
    /// deployment back and creates exactly one evaluation.
    #[tokio::test]
    async fn rollback_on_unhealthy_creates_one_evaluation() {
        let store = StateStore::new();
        let ns = Namespace::default_namespace();
        let job_id = JobId("web".into());
        let (raft, batcher) = harness(store.clone());

        let job = Job {
            id: job_id.clone(),
            namespace: ns.clone(),
            name: "web".into(),
            version: 1,
            priority: 50,
            node_pool: "default".into(),
            task_groups: vec![TaskGroup {
                name: "web".into(),
                count: 1,
                tasks: vec!["server".into()],
            }],
            meta: StdHashMap::new(),
            stable: true,
            indices: Default::default(),
        };
        // Archive version 0 as the prior stable version with a different
        // spec hash (different task list), then install version 1 as current.
        let mut prior = job.clone();
        prior.version = 0;
        prior.task_groups = vec![TaskGroup {
            name: "web".into(),
            count: 1,
            tasks: vec!["server-old".into()],
        }];
        store.upsert_job(prior, 1);
        store.upsert_job(job, 2);

        let mut groups = StdHashMap::new();
        let mut tg = task_group(Utc::now() + ChronoDuration::seconds(60));
        tg.auto_revert = true;
        tg.unhealthy_allocs = 0;
        groups.insert("web".to_string(), tg);
        let dep = deployment(&ns, &job_id, groups.clone());
        store.upsert_deployment(dep.clone(), 3);

        let mut watcher = DeploymentWatcher::new(store.clone(), raft, batcher, ns.clone(), dep.id.clone());
        // First tick seeds `last_unhealthy` at 0 without triggering.
        assert!(!watcher.detect_new_unhealthy(&dep));

        let mut unhealthy_groups = groups;
        unhealthy_groups.get_mut("web").unwrap().unhealthy_allocs = 1;
        let unhealthy_dep = deployment(&ns, &job_id, unhealthy_groups);
        assert!(watcher.detect_new_unhealthy(&unhealthy_dep));

        watcher.rollback_on_unhealthy(&unhealthy_dep).await.unwrap();

        let reloaded = store.get_job(&ns, &job_id).unwrap();
        assert_eq!(reloaded.version, 2, "rollback installs a new version reverted to the prior spec");
        assert!(!reloaded.stable);
        assert_eq!(reloaded.task_groups[0].tasks, vec!["server-old".to_string()]);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(evaluations_for(&store, &job_id), 1);
    }

    /// spec.md §8 scenario 3: promotion is all-or-nothing across every
    /// task group with canaries — a deployment is not promoted until every
    /// one of them is healthy.
    #[tokio::test]
    async fn auto_promote_is_all_or_nothing() {
        let store = StateStore::new();
        let ns = Namespace::default_namespace();
        let job_id = JobId("web".into());
        let (raft, batcher) = harness(store.clone());

        let mut canary_a = task_group(Utc::now() + ChronoDuration::seconds(60));
        canary_a.auto_promote = true;
        canary_a.desired_canaries = 1;
        canary_a.placed_canaries = 1;
        canary_a.healthy_allocs = 1;

        let mut canary_b = task_group(Utc::now() + ChronoDuration::seconds(60));
        canary_b.auto_promote = true;
        canary_b.desired_canaries = 1;
        canary_b.placed_canaries = 1;
        canary_b.healthy_allocs = 0; // not yet healthy

        let mut groups = StdHashMap::new();
        groups.insert("a".to_string(), canary_a);
        groups.insert("b".to_string(), canary_b.clone());
        let dep = deployment(&ns, &job_id, groups);
        store.upsert_deployment(dep.clone(), 1);

        let watcher = DeploymentWatcher::new(store.clone(), raft.clone(), batcher.clone(), ns.clone(), dep.id.clone());
        watcher.check_auto_promotion(&dep).await.unwrap();

        let reloaded = store.get_deployment(&ns, &dep.id).unwrap();
        assert!(
            reloaded.task_groups.values().all(|tg| !tg.promoted),
            "no task group promotes while any canary group is unhealthy"
        );

        // Now group "b" turns healthy — both should promote together.
        let mut healthy_groups = reloaded.task_groups.clone();
        healthy_groups.get_mut("b").unwrap().healthy_allocs = 1;
        let healthy_dep = deployment(&ns, &job_id, healthy_groups);
        store.upsert_deployment(healthy_dep.clone(), 2);

        watcher.check_auto_promotion(&healthy_dep).await.unwrap();
        let reloaded = store.get_deployment(&ns, &dep.id).unwrap();
        assert!(reloaded.task_groups.values().all(|tg| tg.promoted));
        assert_eq!(reloaded.status, DeploymentStatusKind::Running);
    }
}
