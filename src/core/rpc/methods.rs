// src/core/rpc/methods.rs
//
// The RPC method surface (spec.md §6), grouped by subsystem. Each variant
// names a method; bodies carry only what's specific to that call — the
// common envelope and query options live in the parent module.

use crate::core::domain::{
    AllocId, DeploymentId, JobId, OneTimeToken, Policy, PolicyName, Role, RoleId, Token,
    TokenAccessor,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AclMethod {
    UpsertPolicies(Vec<Policy>),
    DeletePolicies(Vec<PolicyName>),
    ListPolicies,
    GetPolicy(PolicyName),
    GetPolicies(Vec<PolicyName>),
    Bootstrap,
    UpsertTokens(Vec<Token>),
    DeleteTokens(Vec<TokenAccessor>),
    ListTokens,
    GetToken(TokenAccessor),
    GetTokens(Vec<TokenAccessor>),
    ResolveToken(String),
    UpsertOneTimeToken(OneTimeToken),
    ExchangeOneTimeToken(String),
    ExpireOneTimeTokens,
    UpsertRoles(Vec<Role>),
    DeleteRolesByID(Vec<RoleId>),
    ListRoles,
    GetRolesByID(Vec<RoleId>),
    GetRoleByID(RoleId),
    GetRoleByName(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeploymentMethod {
    SetAllocHealth {
        deployment_id: DeploymentId,
        healthy: Vec<AllocId>,
        unhealthy: Vec<AllocId>,
    },
    Promote {
        deployment_id: DeploymentId,
        all: bool,
        task_groups: Vec<String>,
    },
    Pause {
        deployment_id: DeploymentId,
        pause: bool,
    },
    Fail {
        deployment_id: DeploymentId,
    },
    /// Internal blocking query over the deployments table.
    List,
    Get(DeploymentId),
}

/// Every node-routed RPC forces `allow-stale=true` at the dispatch layer
/// (spec.md §6) — see `core::forwarding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeRoutedMethod {
    ClientMetaGet { node_id: String, key: String },
    ClientMetaPut { node_id: String, key: String, value: String },
    ClientMetaPatch { node_id: String, patch: Vec<(String, Option<String>)> },
    NodeMetaApply { node_id: String, job_id: JobId },
    NodeMetaRead { node_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcMethod {
    Acl(AclMethod),
    Deployment(DeploymentMethod),
    NodeRouted(NodeRoutedMethod),
}
