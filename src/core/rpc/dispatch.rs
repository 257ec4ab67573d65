// src/core/rpc/dispatch.rs
//
// The prologue every handler begins with (spec.md §4.3, §7): authenticate,
// then decide forwarding, in the fixed region -> leader -> node order.
// Authentication failures still go through forwarding before being reported,
// so a follower with stale ACL state never incorrectly returns
// permission-denied for a request the leader would have allowed
// (spec.md §7 Propagation policy).

use crate::core::acl::{AclResolver, CapabilitySet, TransportContext};
use crate::core::domain::Region;
use crate::core::errors::{OrchError, OrchResult};
use crate::core::forwarding::leader::forward_to_leader;
use crate::core::forwarding::node::{forward_to_node, NodeSessionTable};
use crate::core::forwarding::region::{forward_to_region, RegionMembership};
use crate::core::forwarding::transport::{RpcEnvelope, RpcTransport};
use crate::core::forwarding::{decide, DispatchContext, ForwardDecision, NodeRouting, RpcKind};
use crate::core::raft::RaftHandle;
use crate::core::rpc::RequestEnvelope;
use std::sync::Arc;

/// What the dispatch prologue produced: either the caller should proceed
/// with its method-specific local execution (with the resolved capability
/// set in hand), or a forward has already supplied the final reply.
pub enum Outcome {
    Local { capabilities: CapabilitySet, allow_stale: bool },
    Forwarded(RpcEnvelope),
}

pub struct DispatchDeps<'a> {
    pub resolver: &'a AclResolver,
    pub raft: &'a dyn RaftHandle,
    pub transport: &'a Arc<dyn RpcTransport>,
    pub region_membership: &'a RegionMembership,
    pub node_sessions: &'a NodeSessionTable,
    pub local_region: Region,
}

/// Runs the full prologue for one request: decide forwarding first (region
/// -> leader -> node), and only authenticate once the decision is to
/// execute locally. A request that forwards is authenticated by whichever
/// server finally handles it locally — forwarding must never be skipped
/// because authentication would have failed here (spec.md §7).
pub async fn dispatch(
    deps: &DispatchDeps<'_>,
    request: &RequestEnvelope,
    kind: RpcKind,
    node_routing: NodeRouting,
    envelope: RpcEnvelope,
    transport_ctx: TransportContext,
) -> OrchResult<Outcome> {
    let mut ctx = DispatchContext::new(deps.local_region.clone(), deps.local_region.clone());
    ctx.allow_stale = request.query_options.allow_stale;

    let decision = decide(
        &mut ctx,
        &request.region,
        kind,
        node_routing,
        deps.raft.is_leader(),
        |n| deps.node_sessions.is_local(n),
    )?;

    match decision {
        ForwardDecision::Region(region) => {
            let reply = forward_to_region(deps.transport, deps.region_membership, &region.0, envelope).await?;
            Ok(Outcome::Forwarded(reply))
        }
        ForwardDecision::Leader => {
            let reply = forward_to_leader(deps.transport, deps.raft, envelope).await?;
            Ok(Outcome::Forwarded(reply))
        }
        ForwardDecision::Node(node_id) => {
            let reply = forward_to_node(deps.transport, deps.node_sessions, &node_id, envelope).await?;
            Ok(Outcome::Forwarded(reply))
        }
        ForwardDecision::Local => {
            let identity = deps
                .resolver
                .authenticate(&request.auth_token, &transport_ctx)
                .map_err(|_| OrchError::PermissionDenied)?;
            let capabilities = deps.resolver.resolve(&identity)?;
            Ok(Outcome::Local {
                capabilities,
                allow_stale: ctx.allow_stale,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::acl::NodeRegistry;
    use crate::core::domain::{Credential, Namespace};
    use crate::core::forwarding::transport::RpcTransport;
    use crate::core::raft::requests::RaftRequest;
    use crate::core::raft::{ApplyError, ApplyOutcome};
    use crate::core::rpc::RequestQueryOptions;
    use crate::core::state_store::StateStore;
    use async_trait::async_trait;

    struct FakeTransport;

    #[async_trait]
    impl RpcTransport for FakeTransport {
        async fn send(&self, _target_addr: &str, envelope: RpcEnvelope) -> OrchResult<RpcEnvelope> {
            Ok(envelope)
        }
    }

    struct FakeRaft {
        leader: bool,
    }

    #[async_trait]
    impl RaftHandle for FakeRaft {
        async fn submit(&self, _request: RaftRequest) -> Result<ApplyOutcome, ApplyError> {
            Ok(ApplyOutcome { commit_index: 1 })
        }

        fn is_leader(&self) -> bool {
            self.leader
        }

        fn leader_hint(&self) -> Option<String> {
            Some("10.0.0.1:4647".into())
        }
    }

    fn test_resolver() -> AclResolver {
        AclResolver::new(true, StateStore::new(), NodeRegistry::default(), None, "mgmt-secret".into())
    }

    fn test_request(region: &str) -> RequestEnvelope {
        RequestEnvelope {
            region: Region(region.into()),
            namespace: Namespace("default".into()),
            auth_token: Credential("mgmt-secret".into()),
            query_options: RequestQueryOptions::default(),
        }
    }

    #[tokio::test]
    async fn foreign_region_forwards_without_authenticating() {
        let resolver = test_resolver();
        let raft: Arc<dyn RaftHandle> = Arc::new(FakeRaft { leader: true });
        let transport: Arc<dyn RpcTransport> = Arc::new(FakeTransport);
        let membership = RegionMembership::new();
        membership.set_servers("eu-west", vec!["10.0.0.9:4647".into()]);
        let sessions = NodeSessionTable::new();

        let deps = DispatchDeps {
            resolver: &resolver,
            raft: raft.as_ref(),
            transport: &transport,
            region_membership: &membership,
            node_sessions: &sessions,
            local_region: Region("us-east".into()),
        };
        let mut request = test_request("eu-west");
        request.auth_token = Credential("garbage-token".into());

        let outcome = dispatch(
            &deps,
            &request,
            RpcKind::Read,
            NodeRouting::None,
            RpcEnvelope {
                method: "Acl.ListPolicies".into(),
                body: vec![],
            },
            TransportContext::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Outcome::Forwarded(_)));
    }

    #[tokio::test]
    async fn local_leader_authenticates_management_secret() {
        let resolver = test_resolver();
        let raft: Arc<dyn RaftHandle> = Arc::new(FakeRaft { leader: true });
        let transport: Arc<dyn RpcTransport> = Arc::new(FakeTransport);
        let membership = RegionMembership::new();
        let sessions = NodeSessionTable::new();

        let deps = DispatchDeps {
            resolver: &resolver,
            raft: raft.as_ref(),
            transport: &transport,
            region_membership: &membership,
            node_sessions: &sessions,
            local_region: Region("us-east".into()),
        };
        let request = test_request("us-east");

        let outcome = dispatch(
            &deps,
            &request,
            RpcKind::Write,
            NodeRouting::None,
            RpcEnvelope {
                method: "Acl.Bootstrap".into(),
                body: vec![],
            },
            TransportContext::default(),
        )
        .await
        .unwrap();

        match outcome {
            Outcome::Local { capabilities, .. } => {
                assert!(matches!(capabilities, CapabilitySet::Management));
            }
            Outcome::Forwarded(_) => panic!("expected local execution"),
        }
    }

    #[tokio::test]
    async fn write_on_follower_forwards_to_leader_before_auth_check() {
        let resolver = test_resolver();
        let raft: Arc<dyn RaftHandle> = Arc::new(FakeRaft { leader: false });
        let transport: Arc<dyn RpcTransport> = Arc::new(FakeTransport);
        let membership = RegionMembership::new();
        let sessions = NodeSessionTable::new();

        let deps = DispatchDeps {
            resolver: &resolver,
            raft: raft.as_ref(),
            transport: &transport,
            region_membership: &membership,
            node_sessions: &sessions,
            local_region: Region("us-east".into()),
        };
        let mut request = test_request("us-east");
        request.auth_token = Credential("bogus".into());

        let outcome = dispatch(
            &deps,
            &request,
            RpcKind::Write,
            NodeRouting::None,
            RpcEnvelope {
                method: "Acl.UpsertPolicies".into(),
                body: vec![],
            },
            TransportContext::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Outcome::Forwarded(_)));
    }
}
