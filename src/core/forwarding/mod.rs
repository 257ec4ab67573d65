// src/core/forwarding/mod.rs
//
// Forwarding layer: the authenticate-then-decide-forward prologue every
// handler begins with. Three possibly-composed redirections, applied in
// order: region forward, leader forward, node forward. Grounded on the
// teacher's reconnect/backoff idiom in
// `core::replication::worker::ReplicaWorker::run` (reused here for pooled
// forward connections) and `ServerState::clients` for the short-held,
// no-lock-across-await node session table.

pub mod leader;
pub mod node;
pub mod region;
pub mod transport;

use crate::core::domain::{NodeId, Region};
use crate::core::errors::{OrchError, OrchResult};
pub use transport::{RpcEnvelope, RpcTransport};

const DEFAULT_HOP_BUDGET: u8 = 8;

/// What the dispatch prologue decided to do with a request, after
/// authentication succeeded.
#[derive(Debug, Clone)]
pub enum ForwardDecision {
    /// Execute locally — no redirection applies.
    Local,
    /// Forward the whole request to a server of `region` and return its reply verbatim.
    Region(Region),
    /// Forward to the Raft leader in the local region.
    Leader,
    /// Forward to the peer holding the named node's session.
    Node(NodeId),
}

/// Whether this RPC is a write that eventually calls `raft_apply`, or a
/// read that may be served locally if stale reads are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcKind {
    Read,
    Write,
}

/// Whether this RPC must terminate at a specific client-node connection —
/// forces `allow_stale = true` at dispatch regardless of caller intent
/// (spec.md §4.3), to break the leader<->follower<->leader ping-pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRouting {
    None,
    Node(NodeIdSlot),
}

/// Placeholder indirection so `NodeRouting` can be constructed before the
/// concrete `NodeId` is known to the caller (kept distinct from `NodeId`
/// itself to make the "only set when node-routed" intent explicit at call sites).
pub type NodeIdSlot = NodeId;

#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub local_region: Region,
    pub authoritative_region: Region,
    pub hop_budget: u8,
    pub allow_stale: bool,
}

impl DispatchContext {
    pub fn new(local_region: Region, authoritative_region: Region) -> Self {
        Self {
            local_region,
            authoritative_region,
            hop_budget: DEFAULT_HOP_BUDGET,
            allow_stale: false,
        }
    }
}

/// Decides how to route a request, honoring the fixed precedence: region,
/// then leader, then node. Writes to globally-scoped objects must have
/// already had their `region` rewritten to the authoritative region by the
/// caller before this runs.
pub fn decide(
    ctx: &mut DispatchContext,
    target_region: &Region,
    kind: RpcKind,
    node_routing: NodeRouting,
    is_leader: bool,
    node_session_held_locally: impl Fn(&NodeId) -> bool,
) -> OrchResult<ForwardDecision> {
    if ctx.hop_budget == 0 {
        return Err(OrchError::Transient("forward hop budget exhausted".into()));
    }

    // Node-targeted RPCs force allow-stale as they enter dispatch,
    // unconditionally, to avoid the leader<->follower ping-pong.
    if let NodeRouting::Node(_) = node_routing {
        ctx.allow_stale = true;
    }

    if target_region != &ctx.local_region {
        ctx.hop_budget -= 1;
        return Ok(ForwardDecision::Region(target_region.clone()));
    }

    if kind == RpcKind::Write && !is_leader {
        ctx.hop_budget -= 1;
        return Ok(ForwardDecision::Leader);
    }
    if kind == RpcKind::Read && !ctx.allow_stale && !is_leader {
        ctx.hop_budget -= 1;
        return Ok(ForwardDecision::Leader);
    }

    if let NodeRouting::Node(node_id) = node_routing {
        if !node_session_held_locally(&node_id) {
            ctx.hop_budget -= 1;
            return Ok(ForwardDecision::Node(node_id));
        }
    }

    Ok(ForwardDecision::Local)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(s: &str) -> Region {
        Region(s.to_string())
    }

    #[test]
    fn write_on_follower_forwards_to_leader() {
        let mut ctx = DispatchContext::new(region("us-east"), region("us-east"));
        let decision = decide(
            &mut ctx,
            &region("us-east"),
            RpcKind::Write,
            NodeRouting::None,
            false,
            |_| false,
        )
        .unwrap();
        assert!(matches!(decision, ForwardDecision::Leader));
    }

    #[test]
    fn node_routing_forces_allow_stale() {
        let mut ctx = DispatchContext::new(region("us-east"), region("us-east"));
        let node = NodeId("node-1".into());
        let decision = decide(
            &mut ctx,
            &region("us-east"),
            RpcKind::Read,
            NodeRouting::Node(node.clone()),
            false,
            |_| false,
        )
        .unwrap();
        assert!(ctx.allow_stale);
        assert!(matches!(decision, ForwardDecision::Node(n) if n == node));
    }

    #[test]
    fn hop_budget_exhaustion_terminates_forwarding() {
        let mut ctx = DispatchContext::new(region("us-east"), region("us-east"));
        ctx.hop_budget = 0;
        let result = decide(
            &mut ctx,
            &region("us-west"),
            RpcKind::Read,
            NodeRouting::None,
            true,
            |_| true,
        );
        assert!(result.is_err());
    }
}
