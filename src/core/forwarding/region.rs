// src/core/forwarding/region.rs
//
// Region forward: if a request's target region is not local, hand the whole
// request to any server of that region and return its reply verbatim.
// Writes to globally-scoped objects (ACL policies, roles, namespaces) must
// already have had their region rewritten to the authoritative region by
// the caller before this runs — this module never makes that decision
// itself, it only executes it.

use crate::core::errors::{OrchError, OrchResult};
use crate::core::forwarding::transport::{RpcEnvelope, RpcTransport};
use dashmap::DashMap;
use std::sync::Arc;

/// Static (config-loaded) membership: which addresses serve which region.
/// Updated out of band (gossip/config reload); this module only reads it.
#[derive(Default)]
pub struct RegionMembership {
    servers_by_region: DashMap<String, Vec<String>>,
}

impl RegionMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_servers(&self, region: &str, addrs: Vec<String>) {
        self.servers_by_region.insert(region.to_string(), addrs);
    }

    pub fn any_server(&self, region: &str) -> Option<String> {
        self.servers_by_region
            .get(region)
            .and_then(|addrs| addrs.first().cloned())
    }
}

/// Forwards `envelope` to any server of `region`, returning its reply.
pub async fn forward_to_region(
    transport: &Arc<dyn RpcTransport>,
    membership: &RegionMembership,
    region: &str,
    envelope: RpcEnvelope,
) -> OrchResult<RpcEnvelope> {
    let addr = membership
        .any_server(region)
        .ok_or_else(|| OrchError::Transient(format!("no known server in region {region}")))?;
    transport.send(&addr, envelope).await
}
