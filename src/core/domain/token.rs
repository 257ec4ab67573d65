// src/core/domain/token.rs

use super::ids::{PolicyName, RoleId, TokenAccessor};
use super::indexed::Indices;
use crate::impl_indexed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Client,
    Management,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenScope {
    Local,
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Internal, immutable, unique identifier. Never rotates.
    pub accessor: TokenAccessor,
    /// The bearer value clients present. Only ever shown once, at creation.
    pub secret: String,
    pub name: String,
    pub kind: TokenKind,
    pub scope: TokenScope,
    pub policies: Vec<PolicyName>,
    pub roles: Vec<RoleId>,
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Token);

impl Token {
    pub fn is_management(&self) -> bool {
        matches!(self.kind, TokenKind::Management)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|exp| now >= exp)
    }
}

/// The fixed, process-wide singleton the empty credential resolves to.
/// Modeled as an immutable value constructed once at process start and never
/// mutated afterwards (spec.md Design Notes: "Global mutable singleton").
pub fn anonymous_token() -> Token {
    Token {
        accessor: TokenAccessor("anonymous".into()),
        secret: String::new(),
        name: "Anonymous Token".into(),
        kind: TokenKind::Client,
        scope: TokenScope::Local,
        policies: vec![PolicyName("anonymous".into())],
        roles: vec![],
        expiration_time: None,
        indices: Indices::default(),
    }
}
