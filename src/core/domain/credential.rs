// src/core/domain/credential.rs

//! The bearer secret a caller attaches to a request, before it has been
//! resolved into an `Identity` by the ACL resolver (see `core::acl`).

use serde::{Deserialize, Serialize};

/// An opaque bearer secret as it arrives on the wire, unvalidated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credential(pub String);

impl Credential {
    pub fn anonymous() -> Self {
        Credential(String::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    /// Signed workload claims are distinguished from plain accessor/secret
    /// tokens by a fixed prefix, mirroring the teacher's `AUTH` special-case
    /// carve-out in `acl::enforcer::check_permission`: a single cheap check
    /// up front instead of attempting every kind of parse.
    pub fn looks_like_workload_claim(&self) -> bool {
        self.0.starts_with("wlc.")
    }
}
