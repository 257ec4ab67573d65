// src/core/forwarding/leader.rs
//
// Leader forward: writes always go to the Raft leader in the local region;
// reads go there too unless the caller accepts stale data. Leadership is
// answered by the injected `RaftHandle` (§ core::raft) — this module never
// tracks leadership itself.

use crate::core::errors::{OrchError, OrchResult};
use crate::core::forwarding::transport::{RpcEnvelope, RpcTransport};
use crate::core::raft::RaftHandle;
use std::sync::Arc;

/// Forwards `envelope` to the current leader, as reported by `handle`.
pub async fn forward_to_leader(
    transport: &Arc<dyn RpcTransport>,
    handle: &dyn RaftHandle,
    envelope: RpcEnvelope,
) -> OrchResult<RpcEnvelope> {
    let addr = handle
        .leader_hint()
        .ok_or_else(|| OrchError::Transient("no known leader to forward to".into()))?;
    transport.send(&addr, envelope).await
}
