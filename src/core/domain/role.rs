// src/core/domain/role.rs

use super::ids::{PolicyName, RoleId, RoleName};
use super::indexed::Indices;
use crate::impl_indexed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub policies: Vec<PolicyName>,
    pub description: String,
    /// A Vault-style per-role TTL ceiling carried over from the original
    /// source's token model; this system has no TTL-ceiling concept of its
    /// own, so a non-zero value is rejected at upsert time rather than
    /// silently ignored (spec.md §8 boundary case).
    #[serde(default)]
    pub explicit_max_ttl: u64,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Role);
