// src/core/domain/policy.rs

//! Named rule documents. See `core::acl::policy_compile` for how the `rules`
//! text is parsed into an enforceable internal form.

use super::ids::PolicyName;
use super::indexed::Indices;
use crate::impl_indexed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub name: PolicyName,
    /// Raw rule text, in the same small rule language the teacher's ACL
    /// config uses (`+cmd`, `-@category`, `~key:*`, ...).
    pub rules: String,
    pub description: String,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Policy);
