// src/core/forwarding/node.rs
//
// Node forward: RPCs that must terminate at a specific client-node
// connection (e.g. streaming exec, node drain) consult a local
// node->session table. If this server doesn't hold the session, it finds a
// peer in the region that does and forwards there. Modeled on how the
// teacher protects `ServerState::clients` (`Arc<DashMap<...>>`, looked up
// and cloned out before any await, never held across one).

use crate::core::domain::NodeId;
use crate::core::errors::{OrchError, OrchResult};
use crate::core::forwarding::transport::{RpcEnvelope, RpcTransport};
use dashmap::DashMap;
use std::sync::Arc;

/// Tracks, for nodes whose session this server holds locally, nothing more
/// than presence — the session itself (the actual streaming connection) is
/// owned by the connection-handling layer, out of scope here.
#[derive(Default)]
pub struct NodeSessionTable {
    local_sessions: Arc<DashMap<NodeId, ()>>,
    /// Best-effort hint: which peer address last claimed to hold a given
    /// node's session, refreshed via gossip/heartbeat (out of scope here).
    remote_hints: Arc<DashMap<NodeId, String>>,
}

impl NodeSessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_local(&self, node_id: NodeId) {
        self.local_sessions.insert(node_id, ());
    }

    pub fn unmark_local(&self, node_id: &NodeId) {
        self.local_sessions.remove(node_id);
    }

    pub fn is_local(&self, node_id: &NodeId) -> bool {
        self.local_sessions.contains_key(node_id)
    }

    pub fn set_remote_hint(&self, node_id: NodeId, addr: String) {
        self.remote_hints.insert(node_id, addr);
    }

    pub fn remote_hint(&self, node_id: &NodeId) -> Option<String> {
        self.remote_hints.get(node_id).map(|e| e.clone())
    }
}

/// Forwards `envelope` to whichever peer holds `node_id`'s session.
pub async fn forward_to_node(
    transport: &Arc<dyn RpcTransport>,
    sessions: &NodeSessionTable,
    node_id: &NodeId,
    envelope: RpcEnvelope,
) -> OrchResult<RpcEnvelope> {
    let addr = sessions
        .remote_hint(node_id)
        .ok_or_else(|| OrchError::NotFound(format!("no known session owner for node {node_id}")))?;
    transport.send(&addr, envelope).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_marking_round_trips() {
        let table = NodeSessionTable::new();
        let node = NodeId("n1".into());
        assert!(!table.is_local(&node));
        table.mark_local(node.clone());
        assert!(table.is_local(&node));
        table.unmark_local(&node);
        assert!(!table.is_local(&node));
    }
}
