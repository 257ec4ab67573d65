// src/core/acl/resolver.rs

//! The ACL resolver: `authenticate` turns a bearer credential into an
//! `Identity`; `resolve` turns an `Identity` into a `CapabilitySet`.
//! Grounded on `spineldb::core::acl::enforcer::AclEnforcer`, generalized
//! from a flat rule list checked per-command to a policy-compilation +
//! cache pipeline driven off the replicated state store.

use super::cache::{cache_key, CapabilityCache};
use super::capability::CapabilitySet;
use super::identity::{AuthFailure, Identity};
use super::policy_compile::{self, ParsedPolicy};
use super::workload_claim::{WorkloadClaimVerifier, WORKLOAD_CLAIM_PREFIX};
use crate::core::domain::{anonymous_token, Credential, NodeId, Token, TokenKind};
use crate::core::errors::{OrchError, OrchResult};
use crate::core::state_store::StateStore;
use chrono::Utc;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Per-request context the transport layer supplies alongside the
/// credential — just enough to record an `Unauthenticated` identity.
#[derive(Debug, Clone, Default)]
pub struct TransportContext {
    pub remote_addr: Option<SocketAddr>,
}

/// Bootstrap secrets for client-node first-connection authentication. Nodes
/// themselves are an external collaborator (spec.md §1); this is the one
/// sliver of node identity this crate needs to own.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    by_secret: Arc<DashMap<String, NodeId>>,
}

impl NodeRegistry {
    pub fn register(&self, secret: String, node_id: NodeId) {
        self.by_secret.insert(secret, node_id);
    }

    pub fn lookup(&self, secret: &str) -> Option<NodeId> {
        self.by_secret.get(secret).map(|r| r.clone())
    }
}

pub struct AclResolver {
    enabled: bool,
    store: StateStore,
    cache: CapabilityCache,
    node_registry: NodeRegistry,
    workload_verifier: Option<WorkloadClaimVerifier>,
    management_secret: String,
}

impl AclResolver {
    pub fn new(
        enabled: bool,
        store: StateStore,
        node_registry: NodeRegistry,
        workload_verifier: Option<WorkloadClaimVerifier>,
        management_secret: String,
    ) -> Self {
        Self {
            enabled,
            store,
            cache: CapabilityCache::default(),
            node_registry,
            workload_verifier,
            management_secret,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// `authenticate(request, transport-context) -> identity`.
    pub fn authenticate(
        &self,
        credential: &Credential,
        ctx: &TransportContext,
    ) -> Result<Identity, AuthFailure> {
        if !self.management_secret.is_empty() && secrets_eq(&credential.0, &self.management_secret)
        {
            return Ok(Identity::Management);
        }

        if credential.is_anonymous() {
            return Ok(Identity::UserToken(anonymous_token().accessor));
        }

        if credential.looks_like_workload_claim() {
            let Some(verifier) = &self.workload_verifier else {
                return Err(AuthFailure::Invalid);
            };
            let raw = credential
                .0
                .strip_prefix(WORKLOAD_CLAIM_PREFIX)
                .unwrap_or(&credential.0);
            return match verifier.verify(raw) {
                Ok(alloc_id) => {
                    let alloc = self
                        .store
                        .allocations
                        .iter_values()
                        .into_iter()
                        .find(|a| a.id == alloc_id);
                    match alloc {
                        Some(a) if !a.client_status.is_terminal() => {
                            Ok(Identity::WorkloadClaim { alloc_id: a.id })
                        }
                        Some(_) => Err(AuthFailure::Invalid),
                        None => Err(AuthFailure::NotFound),
                    }
                }
                Err(super::workload_claim::WorkloadClaimError::Expired) => {
                    Err(AuthFailure::Expired)
                }
                Err(_) => Err(AuthFailure::Invalid),
            };
        }

        if let Some(node_id) = self.node_registry.lookup(&credential.0) {
            return Ok(Identity::ClientNode(node_id));
        }

        match self.find_token_by_secret(&credential.0) {
            Some(token) if token.is_expired_at(Utc::now()) => Err(AuthFailure::Expired),
            Some(token) => Ok(Identity::UserToken(token.accessor)),
            None => Err(AuthFailure::NotFound),
        }
    }

    fn find_token_by_secret(&self, secret: &str) -> Option<Token> {
        self.store
            .tokens
            .iter_values()
            .into_iter()
            .find(|t| secrets_eq(&t.secret, secret))
    }

    /// `resolve(identity) -> capability-set | none`.
    pub fn resolve(&self, identity: &Identity) -> OrchResult<CapabilitySet> {
        if !self.enabled {
            return Ok(CapabilitySet::Management);
        }

        match identity {
            Identity::Management => Ok(CapabilitySet::Management),
            Identity::Unauthenticated { .. } => Ok(CapabilitySet::None),
            Identity::ClientNode(_) => Ok(CapabilitySet::Management),
            Identity::WorkloadClaim { .. } => {
                // A workload claim is scoped purely to its own allocation,
                // not to policy-based capabilities.
                Ok(CapabilitySet::None)
            }
            Identity::UserToken(accessor) => {
                let token = self
                    .store
                    .get_token(accessor)
                    .or_else(|| {
                        (accessor == &anonymous_token().accessor).then(anonymous_token)
                    })
                    .ok_or_else(|| OrchError::NotFound(format!("token {accessor}")))?;

                if token.is_expired_at(Utc::now()) {
                    return Err(OrchError::PermissionDenied);
                }
                if token.is_management() {
                    return Ok(CapabilitySet::Management);
                }

                let mut policy_names = token.policies.clone();
                for role_id in &token.roles {
                    if let Some(role) = self.store.get_role(role_id) {
                        policy_names.extend(role.policies);
                    }
                }
                policy_names.sort();
                policy_names.dedup();

                let key = cache_key(policy_names.iter().collect());
                if let Some(cached) = self.cache.get(&key) {
                    return Ok(cached);
                }

                let mut compiled: Vec<ParsedPolicy> = Vec::new();
                for name in &policy_names {
                    // Unknown referenced policies are skipped — they grant
                    // nothing, they don't error the whole resolution.
                    if let Some(policy) = self.store.get_policy(name) {
                        match policy_compile::compile(name, &policy.rules) {
                            Ok(parsed) => compiled.push(parsed),
                            Err(e) => debug!(%name, error = %e, "skipping unparsable policy"),
                        }
                    }
                }

                let capability_set = if compiled.is_empty() {
                    CapabilitySet::None
                } else {
                    CapabilitySet::Policies(Arc::new(compiled))
                };
                self.cache.put(key, capability_set.clone());
                Ok(capability_set)
            }
        }
    }

    /// `resolve-token(secret) -> capability-set` in one call; legacy path
    /// convenience wrapper around `authenticate` + `resolve`.
    pub fn resolve_token(&self, secret: &str) -> OrchResult<CapabilitySet> {
        let identity = self
            .authenticate(&Credential(secret.to_string()), &TransportContext::default())
            .map_err(|f| match f {
                AuthFailure::Expired => OrchError::PermissionDenied,
                AuthFailure::Invalid => OrchError::PermissionDenied,
                AuthFailure::NotFound => OrchError::NotFound("token".into()),
            })?;
        self.resolve(&identity)
    }
}

fn secrets_eq(a: &str, b: &str) -> bool {
    super::workload_claim::secrets_match(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Policy, PolicyName, Role, RoleId, RoleName, TokenAccessor, TokenScope};

    fn resolver(store: StateStore) -> AclResolver {
        AclResolver::new(true, store, NodeRegistry::default(), None, "mgmt-secret".into())
    }

    #[test]
    fn management_secret_authenticates_as_management() {
        let resolver = resolver(StateStore::new());
        let identity = resolver
            .authenticate(&Credential("mgmt-secret".into()), &TransportContext::default())
            .unwrap();
        assert!(matches!(identity, Identity::Management));
        assert!(matches!(resolver.resolve(&identity).unwrap(), CapabilitySet::Management));
    }

    #[test]
    fn expired_token_is_rejected_at_authenticate() {
        let store = StateStore::new();
        let token = Token {
            accessor: TokenAccessor("acc-1".into()),
            secret: "client-secret".into(),
            name: "client".into(),
            kind: TokenKind::Client,
            scope: TokenScope::Local,
            policies: vec![],
            roles: vec![],
            expiration_time: Some(Utc::now() - chrono::Duration::seconds(1)),
            indices: Default::default(),
        };
        store.upsert_token(token, 1);

        let resolver = resolver(store);
        let err = resolver
            .authenticate(&Credential("client-secret".into()), &TransportContext::default())
            .unwrap_err();
        assert!(matches!(err, AuthFailure::Expired));
    }

    #[test]
    fn user_token_resolves_policies_through_its_roles() {
        let store = StateStore::new();
        store.upsert_policy(
            Policy {
                name: PolicyName("readers".into()),
                rules: "~* +@read".into(),
                description: String::new(),
                indices: Default::default(),
            },
            1,
        );
        store.upsert_role(
            Role {
                id: RoleId("role-1".into()),
                name: RoleName("reader".into()),
                policies: vec![PolicyName("readers".into())],
                description: String::new(),
                explicit_max_ttl: 0,
                indices: Default::default(),
            },
            2,
        );
        let token = Token {
            accessor: TokenAccessor("acc-1".into()),
            secret: "client-secret".into(),
            name: "client".into(),
            kind: TokenKind::Client,
            scope: TokenScope::Local,
            policies: vec![],
            roles: vec![RoleId("role-1".into())],
            expiration_time: None,
            indices: Default::default(),
        };
        store.upsert_token(token, 3);

        let resolver = resolver(store);
        let identity = resolver
            .authenticate(&Credential("client-secret".into()), &TransportContext::default())
            .unwrap();
        let caps = resolver.resolve(&identity).unwrap();
        assert!(matches!(caps, CapabilitySet::Policies(_)));
    }

    #[test]
    fn unknown_secret_is_not_found() {
        let resolver = resolver(StateStore::new());
        let err = resolver
            .authenticate(&Credential("nope".into()), &TransportContext::default())
            .unwrap_err();
        assert!(matches!(err, AuthFailure::NotFound));
    }
}
