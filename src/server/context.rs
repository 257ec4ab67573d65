// src/server/context.rs

use super::state::ServerState;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Everything `spawner::spawn_all` and the shutdown path need once
/// `initialization::setup` has built the shared state.
///
/// Two shutdown signals are deliberately kept distinct: `shutdown_tx` is an
/// `axum`-compatible broadcast (used by the metrics HTTP server's graceful
/// shutdown), `cancel` is the `CancellationToken` every `core::` actor
/// (deployment watcher supervisor, replication loop) is written against.
/// `spawner::spawn_all` bridges the two with a single forwarding task.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub cancel: CancellationToken,
    pub background_tasks: JoinSet<anyhow::Result<()>>,
}
