// src/server/mod.rs
//
// Bootstrap entry point: build shared state, spawn background tasks, run
// until a shutdown signal arrives. Mirrors `spineldb::server::run`'s
// three-phase shape; this crate has no connection-accept loop of its own
// (the RPC transport is an external collaborator, spec.md §1), so the
// final phase is just waiting out the process's lifetime.

mod context;
mod initialization;
mod metrics_server;
mod spawner;
mod state;

pub use state::ServerState;

use crate::config::Config;
use anyhow::Result;
use tracing::info;

/// Runs the control-plane core until `ctrl_c` (or another external signal
/// translated into one) arrives.
pub async fn run(config: Config) -> Result<()> {
    let mut ctx = initialization::setup(config).await?;
    spawner::spawn_all(&mut ctx).await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = ctx.shutdown_tx.send(());
    ctx.cancel.cancel();

    while let Some(result) = ctx.background_tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("background task panicked: {e}");
            }
        }
    }
    Ok(())
}
