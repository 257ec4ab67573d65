// src/core/raft/single_node.rs
//
// A single-node `RaftHandle`: applies every request synchronously against
// a local `StateStore`, always reports itself as leader, and never has a
// leader hint to offer (there is no one else to forward to). This is the
// crate's own stand-in for the externally-supplied Raft library (spec.md
// §1 Out of scope) — it exists so the binary in `src/server` can run
// end-to-end without linking a real consensus library, the same way a
// database ships an in-memory/standalone mode alongside its clustered one.
// A multi-node deployment replaces this with a `RaftHandle` backed by
// whichever Raft crate the operator links; nothing else in this crate
// changes.

use super::fsm;
use super::requests::RaftRequest;
use super::{ApplyError, ApplyOutcome, RaftHandle};
use crate::core::state_store::StateStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct SingleNodeRaft {
    store: StateStore,
    commit_index: AtomicU64,
}

impl SingleNodeRaft {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            commit_index: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RaftHandle for SingleNodeRaft {
    async fn submit(&self, request: RaftRequest) -> Result<ApplyOutcome, ApplyError> {
        let commit_index = self.commit_index.fetch_add(1, Ordering::AcqRel) + 1;
        fsm::apply(&self.store, request, commit_index).map_err(ApplyError::non_retryable)?;
        Ok(ApplyOutcome { commit_index })
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn leader_hint(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Policy, PolicyName};

    #[tokio::test]
    async fn apply_bumps_commit_index_and_mutates_store() {
        let store = StateStore::new();
        let raft = SingleNodeRaft::new(store.clone());

        let outcome = raft
            .submit(RaftRequest::UpsertPolicies(vec![Policy {
                name: PolicyName("ops".into()),
                rules: "~* +@read".into(),
                description: String::new(),
                indices: Default::default(),
            }]))
            .await
            .unwrap();

        assert_eq!(outcome.commit_index, 1);
        assert!(store.get_policy(&PolicyName("ops".into())).is_some());
    }
}
