// src/core/raft/mod.rs

//! The Raft apply wrapper: serializes a request, submits it to the (external)
//! Raft library, and blocks until commit. The Raft library itself is out of
//! scope (spec.md §1) — this module defines the trait boundary everything
//! else in the crate is written against, plus the deterministic FSM that
//! turns a committed request into `StateStore` mutations.

pub mod fsm;
pub mod requests;
pub mod single_node;

use crate::core::errors::{OrchError, OrchResult};
use crate::core::metrics;
use async_trait::async_trait;
pub use requests::RaftRequest;
pub use single_node::SingleNodeRaft;

/// The outcome of a successful apply: the commit index assigned to the
/// entry, plus whatever domain-level result the FSM produced (e.g. the
/// newly assigned `create_index` for a freshly inserted row).
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub commit_index: u64,
}

/// Whether a failed apply may be safely retried by the caller. Retrying a
/// non-idempotent mutation (most of ours are upserts, which are idempotent
/// at a given commit index) is safe precisely because the FSM is
/// deterministic: replaying the same request against the same prior state
/// produces the same result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyFailureKind {
    /// Leadership lost mid-submission, not-leader, enqueue-timeout.
    Retryable,
    /// Decode error or FSM-level domain error — retrying won't help.
    NonRetryable,
}

#[derive(Debug, Clone)]
pub struct ApplyError {
    pub kind: ApplyFailureKind,
    pub error: OrchError,
}

impl ApplyError {
    pub fn retryable(error: OrchError) -> Self {
        Self {
            kind: ApplyFailureKind::Retryable,
            error,
        }
    }

    pub fn non_retryable(error: OrchError) -> Self {
        Self {
            kind: ApplyFailureKind::NonRetryable,
            error,
        }
    }
}

/// The boundary this crate is written against; the real implementation lives
/// in whichever Raft library the binary links (openraft, async-raft, etc —
/// out of scope per spec.md §1).
#[async_trait]
pub trait RaftHandle: Send + Sync {
    async fn submit(&self, request: RaftRequest) -> Result<ApplyOutcome, ApplyError>;

    /// True only on the server currently holding Raft leadership for its region.
    fn is_leader(&self) -> bool;

    /// The address of the current leader, if known, for leader-forwarding.
    fn leader_hint(&self) -> Option<String>;
}

/// `raft_apply(kind, request) -> (result, commit_index, error)`, generalized
/// here to `raft_apply(handle, request) -> Result<ApplyOutcome, ApplyError>`.
/// Callers that need a post-write lookup must take a fresh `StateStore`
/// snapshot after this returns — the FSM applying the entry and the caller
/// observing it are two different linearization points.
pub async fn raft_apply(
    handle: &dyn RaftHandle,
    request: RaftRequest,
) -> OrchResult<ApplyOutcome> {
    metrics::RAFT_APPLIES_IN_FLIGHT.inc();
    let result = handle.submit(request).await;
    metrics::RAFT_APPLIES_IN_FLIGHT.dec();

    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            let retryable = matches!(e.kind, ApplyFailureKind::Retryable);
            metrics::RAFT_APPLY_ERRORS_TOTAL
                .with_label_values(&[if retryable { "true" } else { "false" }])
                .inc();
            Err(e.error)
        }
    }
}
