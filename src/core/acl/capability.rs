// src/core/acl/capability.rs

use super::policy_compile::ParsedPolicy;
use std::sync::Arc;

/// The resolved permission object a caller's identity maps to. Derived, never
/// stored — management identities skip compilation entirely and get the
/// permissive singleton.
#[derive(Debug, Clone)]
pub enum CapabilitySet {
    /// Bypasses every check.
    Management,
    /// The union of the caller's directly-referenced and role-reachable
    /// policies, already compiled.
    Policies(Arc<Vec<ParsedPolicy>>),
    /// No capabilities — the caller has no usable policies at all.
    None,
}

impl CapabilitySet {
    pub fn is_management(&self) -> bool {
        matches!(self, CapabilitySet::Management)
    }

    /// Whether any compiled policy grants `capability` on `resource`.
    pub fn allows(&self, capability: &str, resource: &str) -> bool {
        match self {
            CapabilitySet::Management => true,
            CapabilitySet::None => false,
            CapabilitySet::Policies(policies) => {
                policies.iter().any(|p| p.allows(capability, resource))
            }
        }
    }
}
