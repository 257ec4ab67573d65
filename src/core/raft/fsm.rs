// src/core/raft/fsm.rs

//! The deterministic state machine: turns one committed `RaftRequest` into
//! `StateStore` mutations. The same entry applied against the same prior
//! state produces the same result on every replica — nothing here may read
//! wall-clock time, randomness, or any input besides the request and the
//! store.

use crate::core::domain::*;
use crate::core::errors::{OrchError, OrchResult};
use crate::core::raft::requests::RaftRequest;
use crate::core::state_store::StateStore;

/// Applies `request` at `commit_index` against `store`.
pub fn apply(store: &StateStore, request: RaftRequest, commit_index: u64) -> OrchResult<()> {
    match request {
        RaftRequest::UpsertPolicies(policies) => {
            for policy in policies {
                store.upsert_policy(policy, commit_index);
            }
            Ok(())
        }
        RaftRequest::DeletePolicies(names) => {
            for name in names {
                store.delete_policy(&name, commit_index);
            }
            Ok(())
        }
        RaftRequest::Bootstrap { management_token, reset_index } => {
            let already_bootstrapped = store.list_tokens().iter().any(|t| t.is_management());
            let reset_matches = reset_index.is_some() && reset_index == Some(store.bootstrap_index());
            if !already_bootstrapped || reset_matches {
                store.upsert_token(management_token, commit_index);
                store.set_bootstrap_index(commit_index);
                Ok(())
            } else {
                Err(OrchError::Conflict("ACL bootstrap already done".into()))
            }
        }
        RaftRequest::UpsertTokens(tokens) => {
            for token in tokens {
                store.upsert_token(token, commit_index);
            }
            Ok(())
        }
        RaftRequest::DeleteTokens(accessors) => {
            for accessor in accessors {
                store.delete_token(&accessor, commit_index);
            }
            Ok(())
        }
        RaftRequest::UpsertOneTimeToken(ott) => {
            store.upsert_one_time_token(ott, commit_index);
            Ok(())
        }
        RaftRequest::ExchangeOneTimeToken { secret, now } => {
            use crate::core::state_store::OttExchangeResult;
            match store.exchange_one_time_token(&secret, now, commit_index) {
                OttExchangeResult::Ok(_) => Ok(()),
                OttExchangeResult::Expired => Err(OrchError::PermissionDenied),
                OttExchangeResult::NotFound => Err(OrchError::NotFound("one-time token".into())),
            }
        }
        RaftRequest::ExpireOneTimeTokens { now } => {
            store.expire_one_time_tokens(now, commit_index);
            Ok(())
        }
        RaftRequest::UpsertRoles(roles) => {
            // Pre-apply validation, whole batch fails on one bad item
            // (spec.md §7): this system has no TTL-ceiling concept, so a
            // role carrying a non-zero `explicit_max_ttl` is rejected
            // outright rather than partially applied.
            if let Some(bad) = roles.iter().find(|r| r.explicit_max_ttl != 0) {
                return Err(OrchError::Validation(format!(
                    "role {} has explicit_max_ttl={} but this system does not support a TTL ceiling",
                    bad.name, bad.explicit_max_ttl
                )));
            }
            for role in roles {
                store.upsert_role(role, commit_index);
            }
            Ok(())
        }
        RaftRequest::DeleteRolesByID(ids) => {
            for id in ids {
                store.delete_role(&id, commit_index);
            }
            Ok(())
        }
        RaftRequest::RegisterJob(job) => {
            store.upsert_job(job, commit_index);
            Ok(())
        }
        RaftRequest::SetAllocHealth {
            namespace,
            deployment_id,
            healthy,
            unhealthy,
        } => apply_set_alloc_health(store, &namespace, &deployment_id, &healthy, &unhealthy, commit_index),
        RaftRequest::Promote {
            namespace,
            deployment_id,
            all,
            task_groups,
        } => apply_promote(store, &namespace, &deployment_id, all, &task_groups, commit_index),
        RaftRequest::PauseDeployment {
            namespace,
            deployment_id,
            pause,
        } => apply_pause(store, &namespace, &deployment_id, pause, commit_index),
        RaftRequest::FailDeployment {
            namespace,
            deployment_id,
            status_description,
        } => apply_fail(store, &namespace, &deployment_id, status_description, commit_index),
        RaftRequest::RollbackDeployment {
            namespace,
            deployment_id,
            job_id,
            reverted_to_version,
            status_description,
        } => {
            if let Some(target_version) = reverted_to_version {
                let reverted = store
                    .list_job_versions(&namespace, &job_id)
                    .into_iter()
                    .find(|j| j.version == target_version)
                    .ok_or_else(|| OrchError::Internal("rollback target version missing".into()))?;
                let mut current = store
                    .get_job(&namespace, &job_id)
                    .ok_or_else(|| OrchError::Internal("rollback target job missing".into()))?;
                current.version += 1;
                current.task_groups = reverted.task_groups;
                current.meta = reverted.meta;
                current.stable = false;
                store.upsert_job(current, commit_index);
            }
            apply_fail(store, &namespace, &deployment_id, status_description, commit_index)
        }
        RaftRequest::BatchCreateEvaluations { job_ids, trigger } => {
            for (namespace, job_id) in job_ids {
                let witness = store
                    .get_job(&namespace, &job_id)
                    .map(|j| j.indices.modify_index)
                    .unwrap_or(commit_index);
                let eval = Evaluation {
                    id: EvalId(format!("{job_id}-{commit_index}")),
                    namespace,
                    priority: 50,
                    trigger,
                    job_id,
                    node_modify_index_witness: witness,
                    status: EvalStatus::Pending,
                    indices: Indices::default(),
                };
                store.upsert_evaluation(eval, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateUpsertPolicies(policies) => {
            for policy in policies {
                store.upsert_policy(policy, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateDeletePolicies(names) => {
            for name in names {
                store.delete_policy(&name, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateUpsertRoles(roles) => {
            for role in roles {
                store.upsert_role(role, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateDeleteRoles(ids) => {
            for id in ids {
                store.delete_role(&id, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateUpsertNamespaces(namespaces) => {
            for ns in namespaces {
                store.upsert_namespace(ns, commit_index);
            }
            Ok(())
        }
        RaftRequest::ReplicateDeleteNamespaces(names) => {
            for name in names {
                store.namespaces.delete(&name, commit_index);
            }
            Ok(())
        }
    }
}

fn apply_set_alloc_health(
    store: &StateStore,
    namespace: &Namespace,
    deployment_id: &DeploymentId,
    healthy: &[AllocId],
    unhealthy: &[AllocId],
    commit_index: u64,
) -> OrchResult<()> {
    let mut deployment = store
        .get_deployment(namespace, deployment_id)
        .ok_or_else(|| OrchError::NotFound(format!("unknown deployment {deployment_id}")))?;

    for alloc_id in healthy.iter().chain(unhealthy.iter()) {
        let mut alloc = store
            .get_allocation(namespace, alloc_id)
            .ok_or_else(|| OrchError::NotFound("unknown alloc".into()))?;
        let status = if healthy.contains(alloc_id) {
            DeploymentHealthStatus::Healthy
        } else {
            DeploymentHealthStatus::Unhealthy
        };
        let canary = alloc.is_canary();
        alloc.deployment_status = Some(DeploymentStatus {
            status,
            canary,
            timestamp: chrono::Utc::now(),
        });
        store.upsert_allocation(alloc, commit_index);
    }

    for alloc_id in healthy {
        if let Some(alloc) = store.get_allocation(namespace, alloc_id) {
            if let Some(tg) = deployment.task_groups.get_mut(&alloc.task_group) {
                tg.healthy_allocs += 1;
                tg.unhealthy_allocs = tg.unhealthy_allocs.saturating_sub(1);
            }
        }
    }
    for alloc_id in unhealthy {
        if let Some(alloc) = store.get_allocation(namespace, alloc_id) {
            if let Some(tg) = deployment.task_groups.get_mut(&alloc.task_group) {
                tg.unhealthy_allocs += 1;
            }
        }
    }

    store.upsert_deployment(deployment, commit_index);
    Ok(())
}

fn apply_promote(
    store: &StateStore,
    namespace: &Namespace,
    deployment_id: &DeploymentId,
    all: bool,
    task_groups: &[String],
    commit_index: u64,
) -> OrchResult<()> {
    let mut deployment = store
        .get_deployment(namespace, deployment_id)
        .ok_or_else(|| OrchError::NotFound(format!("unknown deployment {deployment_id}")))?;

    let target_groups: Vec<String> = if all {
        deployment.task_groups.keys().cloned().collect()
    } else {
        task_groups.to_vec()
    };

    for name in &target_groups {
        let Some(tg) = deployment.task_groups.get(name) else {
            continue;
        };
        if tg.healthy_allocs < tg.desired_canaries {
            return Err(OrchError::Validation(format!(
                "Task group {name} has {}/{} healthy allocations",
                tg.healthy_allocs, tg.desired_canaries
            )));
        }
    }
    for name in &target_groups {
        if let Some(tg) = deployment.task_groups.get_mut(name) {
            tg.promoted = true;
        }
    }

    if deployment.task_groups.values().all(|tg| tg.promoted) {
        deployment.status = DeploymentStatusKind::Running;
    }
    store.upsert_deployment(deployment, commit_index);
    Ok(())
}

fn apply_pause(
    store: &StateStore,
    namespace: &Namespace,
    deployment_id: &DeploymentId,
    pause: bool,
    commit_index: u64,
) -> OrchResult<()> {
    let mut deployment = store
        .get_deployment(namespace, deployment_id)
        .ok_or_else(|| OrchError::NotFound(format!("unknown deployment {deployment_id}")))?;

    match (pause, deployment.status) {
        // Pausing an already-paused deployment, or unpausing a running one,
        // is a no-op that still succeeds.
        (true, DeploymentStatusKind::Paused) => {}
        (false, DeploymentStatusKind::Running) => {}
        (true, DeploymentStatusKind::Running | DeploymentStatusKind::RunningNeedsPromotion) => {
            deployment.status = DeploymentStatusKind::Paused;
        }
        (false, DeploymentStatusKind::Paused) => {
            deployment.status = DeploymentStatusKind::Running;
        }
        _ => {}
    }
    store.upsert_deployment(deployment, commit_index);
    Ok(())
}

fn apply_fail(
    store: &StateStore,
    namespace: &Namespace,
    deployment_id: &DeploymentId,
    status_description: String,
    commit_index: u64,
) -> OrchResult<()> {
    let mut deployment = store
        .get_deployment(namespace, deployment_id)
        .ok_or_else(|| OrchError::NotFound(format!("unknown deployment {deployment_id}")))?;
    deployment.status = DeploymentStatusKind::Failed;
    deployment.status_description = status_description;
    store.upsert_deployment(deployment, commit_index);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{TokenAccessor, TokenKind, TokenScope};
    use chrono::Duration as ChronoDuration;

    fn management_token(accessor: &str) -> Token {
        Token {
            accessor: TokenAccessor(accessor.into()),
            secret: "s3cr3t".into(),
            name: "root".into(),
            kind: TokenKind::Management,
            scope: TokenScope::Global,
            policies: vec![],
            roles: vec![],
            expiration_time: None,
            indices: Default::default(),
        }
    }

    /// spec.md §6/§8: the first bootstrap always succeeds; a second attempt
    /// with no reset-index is a conflict.
    #[test]
    fn bootstrap_once_then_conflict_without_reset() {
        let store = StateStore::new();
        apply(
            &store,
            RaftRequest::Bootstrap {
                management_token: management_token("root-1"),
                reset_index: None,
            },
            1,
        )
        .unwrap();
        assert!(store.list_tokens().iter().any(|t| t.is_management()));

        let err = apply(
            &store,
            RaftRequest::Bootstrap {
                management_token: management_token("root-2"),
                reset_index: None,
            },
            2,
        )
        .unwrap_err();
        assert!(matches!(err, OrchError::Conflict(_)));
    }

    /// spec.md §8: bootstrap with a reset-index matching the store's
    /// recorded bootstrap commit index succeeds and emits a new management
    /// token even though one already exists.
    #[test]
    fn bootstrap_with_matching_reset_index_succeeds() {
        let store = StateStore::new();
        apply(
            &store,
            RaftRequest::Bootstrap {
                management_token: management_token("root-1"),
                reset_index: None,
            },
            1,
        )
        .unwrap();
        assert_eq!(store.bootstrap_index(), 1);

        apply(
            &store,
            RaftRequest::Bootstrap {
                management_token: management_token("root-2"),
                reset_index: Some(1),
            },
            2,
        )
        .unwrap();
        assert_eq!(store.bootstrap_index(), 2);
        assert!(store.get_token(&TokenAccessor("root-2".into())).is_some());
    }

    /// spec.md §3/§8: an expired one-time token resolves to permission-denied,
    /// not not-found, and is still consumed.
    #[test]
    fn exchange_expired_one_time_token_is_permission_denied() {
        let store = StateStore::new();
        let now = chrono::Utc::now();
        let ott = OneTimeToken {
            one_time_secret: "ott-1".into(),
            accessor_id: TokenAccessor("acc-1".into()),
            expires_at: now - ChronoDuration::seconds(1),
        };
        apply(&store, RaftRequest::UpsertOneTimeToken(ott), 1).unwrap();

        let err = apply(
            &store,
            RaftRequest::ExchangeOneTimeToken {
                secret: "ott-1".into(),
                now,
            },
            2,
        )
        .unwrap_err();
        assert!(matches!(err, OrchError::PermissionDenied));

        // Consumed: a second exchange attempt finds nothing left.
        let err = apply(
            &store,
            RaftRequest::ExchangeOneTimeToken {
                secret: "ott-1".into(),
                now,
            },
            3,
        )
        .unwrap_err();
        assert!(matches!(err, OrchError::NotFound(_)));
    }

    /// spec.md §8: exchanging an unexpired one-time token succeeds.
    #[test]
    fn exchange_live_one_time_token_succeeds() {
        let store = StateStore::new();
        let now = chrono::Utc::now();
        let ott = OneTimeToken {
            one_time_secret: "ott-1".into(),
            accessor_id: TokenAccessor("acc-1".into()),
            expires_at: now + ChronoDuration::seconds(60),
        };
        apply(&store, RaftRequest::UpsertOneTimeToken(ott), 1).unwrap();

        apply(
            &store,
            RaftRequest::ExchangeOneTimeToken {
                secret: "ott-1".into(),
                now,
            },
            2,
        )
        .unwrap();
    }

    /// spec.md §8: a role with a non-zero `explicit_max_ttl` is rejected,
    /// and the whole batch fails even if the other roles in it are valid.
    #[test]
    fn upsert_roles_rejects_nonzero_explicit_max_ttl_for_whole_batch() {
        let store = StateStore::new();
        let good = Role {
            id: RoleId("r-good".into()),
            name: RoleName("good".into()),
            policies: vec![],
            description: String::new(),
            explicit_max_ttl: 0,
            indices: Default::default(),
        };
        let bad = Role {
            id: RoleId("r-bad".into()),
            name: RoleName("bad".into()),
            policies: vec![],
            description: String::new(),
            explicit_max_ttl: 3600,
            indices: Default::default(),
        };

        let err = apply(&store, RaftRequest::UpsertRoles(vec![good, bad]), 1).unwrap_err();
        assert!(matches!(err, OrchError::Validation(_)));
        assert!(store.get_role(&RoleId("r-good".into())).is_none());
    }
}
