// src/core/acl/mod.rs
//
// ACL resolver & cache: resolves a bearer credential into a capability set,
// with management bypass, an anonymous singleton, and an LRU cache keyed by
// the compiled policy set. See `resolver::AclResolver`.

pub mod bootstrap;
pub mod cache;
pub mod capability;
pub mod identity;
pub mod policy_compile;
pub mod resolver;
pub mod workload_claim;

pub use bootstrap::build_bootstrap_request;
pub use capability::CapabilitySet;
pub use identity::{AuthFailure, Identity};
pub use resolver::{AclResolver, NodeRegistry, TransportContext};
