// src/core/raft/requests.rs

//! Every kind of mutation that flows through `raft_apply`. One variant per
//! write RPC (spec.md §6) plus the internal mutations the deployment
//! watcher issues (alloc health transitions, eval batches, deployment
//! status updates) that never appear on the external RPC surface directly.

use crate::core::domain::{
    AllocId, DeploymentId, EvalTrigger, Job, JobId, Namespace, OneTimeToken, Policy, PolicyName,
    Role, RoleId, Token, TokenAccessor,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RaftRequest {
    // --- ACL ---
    UpsertPolicies(Vec<Policy>),
    DeletePolicies(Vec<PolicyName>),
    Bootstrap {
        management_token: Token,
        /// The reset-index read from the `acl-bootstrap-reset` side channel
        /// at request time, if the file was present and parsed. Re-bootstrap
        /// is permitted only when this matches the store's recorded
        /// `bootstrap_index` (spec.md §6, §8).
        reset_index: Option<u64>,
    },
    UpsertTokens(Vec<Token>),
    DeleteTokens(Vec<TokenAccessor>),
    UpsertOneTimeToken(OneTimeToken),
    ExchangeOneTimeToken { secret: String, now: DateTime<Utc> },
    ExpireOneTimeTokens { now: DateTime<Utc> },
    UpsertRoles(Vec<Role>),
    DeleteRolesByID(Vec<RoleId>),

    // --- Jobs ---
    RegisterJob(Job),

    // --- Deployment operator RPCs ---
    SetAllocHealth {
        namespace: Namespace,
        deployment_id: DeploymentId,
        healthy: Vec<AllocId>,
        unhealthy: Vec<AllocId>,
    },
    Promote {
        namespace: Namespace,
        deployment_id: DeploymentId,
        all: bool,
        task_groups: Vec<String>,
    },
    PauseDeployment {
        namespace: Namespace,
        deployment_id: DeploymentId,
        pause: bool,
    },
    FailDeployment {
        namespace: Namespace,
        deployment_id: DeploymentId,
        status_description: String,
    },

    // --- Internal, issued only by the deployment watcher ---
    RollbackDeployment {
        namespace: Namespace,
        deployment_id: DeploymentId,
        job_id: JobId,
        reverted_to_version: Option<u64>,
        status_description: String,
    },
    BatchCreateEvaluations {
        job_ids: Vec<(Namespace, JobId)>,
        trigger: EvalTrigger,
    },

    // --- Cross-region replication ---
    ReplicateUpsertPolicies(Vec<Policy>),
    ReplicateDeletePolicies(Vec<PolicyName>),
    ReplicateUpsertRoles(Vec<Role>),
    ReplicateDeleteRoles(Vec<RoleId>),
    ReplicateUpsertNamespaces(Vec<Namespace>),
    ReplicateDeleteNamespaces(Vec<String>),
}
