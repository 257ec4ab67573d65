// src/core/acl/identity.rs

use crate::core::domain::{AllocId, NodeId, TokenAccessor};
use std::net::SocketAddr;

/// The tagged record `authenticate` resolves a `Credential` into. Exactly
/// one variant is populated — whichever kind matched first.
#[derive(Debug, Clone)]
pub enum Identity {
    /// The leader's own private secret — bypasses policy compilation entirely.
    Management,
    /// A concrete or anonymous user token, by accessor.
    UserToken(TokenAccessor),
    /// A verified signed workload claim, scoped to a specific non-terminal
    /// allocation.
    WorkloadClaim { alloc_id: AllocId },
    /// A client-node's bootstrap secret matched — the first-connection case
    /// before the node has a proper session.
    ClientNode(NodeId),
    /// Nothing matched; the remote address is captured for auditing.
    Unauthenticated { remote_addr: Option<SocketAddr> },
}

/// Why `authenticate` failed to resolve a concrete identity for a credential
/// that otherwise looked like a token or claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Expired,
    Invalid,
    NotFound,
}
