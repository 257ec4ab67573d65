// src/server/spawner.rs
//
// Spawns every long-running background task into `ctx.background_tasks`,
// mirroring `spineldb::server::spawner::spawn_all`'s shape: one `spawn` per
// subsystem, each given its own shutdown subscription, collected into a
// single `JoinSet` the caller awaits at shutdown.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::deployment_watcher::DeploymentWatcherSupervisor;
use crate::core::raft::{raft_apply, requests::RaftRequest};
use crate::core::replication::{ReplicationLoop, UnimplementedReplicationSource};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const ONE_TIME_TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let state = ctx.state.clone();
    let cancel = ctx.cancel.clone();

    // Bridge the broadcast shutdown signal (axum's graceful-shutdown idiom)
    // onto the CancellationToken every core:: actor is written against.
    let mut bridge_rx = ctx.shutdown_tx.subscribe();
    let bridge_cancel = cancel.clone();
    ctx.background_tasks.spawn(async move {
        bridge_rx.recv().await.ok();
        bridge_cancel.cancel();
        Ok(())
    });

    if state.config.lock().await.metrics.enabled {
        let metrics_state = state.clone();
        let metrics_shutdown = ctx.shutdown_tx.subscribe();
        ctx.background_tasks.spawn(async move {
            metrics_server::run(metrics_state, metrics_shutdown).await;
            Ok(())
        });
    } else {
        info!("metrics server disabled in configuration");
    }

    let supervisor = DeploymentWatcherSupervisor::new(state.store.clone(), state.raft.clone());
    let supervisor_cancel = cancel.clone();
    ctx.background_tasks.spawn(async move {
        supervisor.run(supervisor_cancel).await;
        Ok(())
    });

    let (local_region, authoritative_region) = {
        let cfg = state.config.lock().await;
        (cfg.region.clone(), cfg.authoritative_region.clone())
    };
    if local_region != authoritative_region {
        info!(
            %local_region,
            %authoritative_region,
            "non-authoritative region: starting cross-region replication loop"
        );
        let source = Arc::new(UnimplementedReplicationSource);
        let loop_state = state.clone();
        let replication = Arc::new(ReplicationLoop::new(source, loop_state.raft.clone(), loop_state.store.clone()));
        let replication_cancel = cancel.clone();
        ctx.background_tasks.spawn(async move {
            replication.run(replication_cancel).await;
            Ok(())
        });
    }

    let sweep_state = state.clone();
    let sweep_cancel = cancel.clone();
    ctx.background_tasks.spawn(async move {
        let mut ticker = tokio::time::interval(ONE_TIME_TOKEN_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = raft_apply(
                        sweep_state.raft.as_ref(),
                        RaftRequest::ExpireOneTimeTokens { now: chrono::Utc::now() },
                    )
                    .await;
                }
                _ = sweep_cancel.cancelled() => break,
            }
        }
        Ok(())
    });

    info!("all background tasks spawned");
    Ok(())
}
