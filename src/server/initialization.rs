// src/server/initialization.rs
//
// Builds `ServerContext` from a loaded `Config`: the state store, the Raft
// handle, and the broadcast shutdown channel every background task
// subscribes to. Mirrors `spineldb::server::initialization::setup`'s
// single entry point, minus the listener/TLS-acceptor setup the teacher
// does — the RPC transport is an external collaborator here (spec.md §1).

use super::context::ServerContext;
use super::state::ServerState;
use crate::config::Config;
use crate::core::raft::{RaftHandle, SingleNodeRaft};
use crate::core::state_store::StateStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn setup(config: Config) -> Result<ServerContext> {
    let store = StateStore::new();

    let raft: Arc<dyn RaftHandle> = if config.raft.peers.is_empty() {
        info!("no raft peers configured: running single-node");
        Arc::new(SingleNodeRaft::new(store.clone()))
    } else {
        warn!(
            peers = ?config.raft.peers,
            "multi-node raft peers configured, but this crate does not embed a clustered \
             raft implementation (spec.md treats the raft library as an external \
             collaborator) — falling back to single-node mode. Link a real RaftHandle \
             to run a cluster."
        );
        Arc::new(SingleNodeRaft::new(store.clone()))
    };

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = ServerState::new(config, store, raft);

    Ok(ServerContext {
        state,
        shutdown_tx,
        cancel: CancellationToken::new(),
        background_tasks: JoinSet::new(),
    })
}
