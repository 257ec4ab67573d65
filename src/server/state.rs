// src/server/state.rs
//
// The shared, `Arc`-wrapped state every background task and RPC handler is
// built against. Mirrors the teacher's `core::state::ServerState`: a plain
// bag of already-constructed subsystem handles, held behind `Arc` so tasks
// can clone cheaply and never lock more than one field's mutex at a time.

use crate::config::Config;
use crate::core::acl::{AclResolver, NodeRegistry};
use crate::core::forwarding::node::NodeSessionTable;
use crate::core::forwarding::region::RegionMembership;
use crate::core::forwarding::transport::{PooledTransport, RpcTransport};
use crate::core::raft::RaftHandle;
use crate::core::rate_limit::RateLimiter;
use crate::core::state_store::StateStore;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ServerState {
    pub config: Arc<Mutex<Config>>,
    pub store: StateStore,
    pub resolver: AclResolver,
    pub raft: Arc<dyn RaftHandle>,
    pub transport: Arc<dyn RpcTransport>,
    pub region_membership: RegionMembership,
    pub node_sessions: NodeSessionTable,
    pub node_registry: NodeRegistry,
    pub mark_node_bad_limiter: RateLimiter,
}

impl ServerState {
    pub fn new(config: Config, store: StateStore, raft: Arc<dyn RaftHandle>) -> Arc<Self> {
        let node_registry = NodeRegistry::default();
        let resolver = AclResolver::new(
            config.acl.enabled,
            store.clone(),
            node_registry.clone(),
            None,
            config.acl.management_secret.clone(),
        );
        let mark_node_bad_limiter = RateLimiter::new(
            config.rate_limit.mark_node_bad.max_events,
            std::time::Duration::from_secs(config.rate_limit.mark_node_bad.per_seconds),
            config.rate_limit.mark_node_bad.burst,
        );

        Arc::new(Self {
            config: Arc::new(Mutex::new(config)),
            store,
            resolver,
            raft,
            transport: Arc::new(PooledTransport::new()),
            region_membership: RegionMembership::new(),
            node_sessions: NodeSessionTable::new(),
            node_registry,
            mark_node_bad_limiter,
        })
    }
}
