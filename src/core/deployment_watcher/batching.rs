// src/core/deployment_watcher/batching.rs
//
// Cross-deployment evaluation batching. Multiple allocation-health events
// landing within a small window collapse into one evaluation per affected
// job, and one aggregated Raft apply per window across every watcher —
// grounded on the teacher's interval-tick loops in
// `core::warden::worker::MasterMonitor::run_tick_loop`, repurposed from a
// periodic health poll to a periodic flush of pending evaluation requests.

use crate::core::domain::{EvalTrigger, JobId, Namespace};
use crate::core::raft::{raft_apply, requests::RaftRequest, RaftHandle};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

const BATCH_WINDOW: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct EvalBatcher {
    tx: mpsc::UnboundedSender<(Namespace, JobId, EvalTrigger)>,
}

impl EvalBatcher {
    /// Spawns the batching actor and returns a cheap handle to it. The
    /// actor runs until `raft` is dropped and the channel closes.
    pub fn spawn(raft: Arc<dyn RaftHandle>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(raft, rx));
        Self { tx }
    }

    /// Queues an evaluation request for `job_id`; coalesced with any other
    /// request for the same job that lands in the same window.
    pub fn notify(&self, namespace: Namespace, job_id: JobId, trigger: EvalTrigger) {
        let _ = self.tx.send((namespace, job_id, trigger));
    }
}

async fn run(
    raft: Arc<dyn RaftHandle>,
    mut rx: mpsc::UnboundedReceiver<(Namespace, JobId, EvalTrigger)>,
) {
    let pending: Arc<Mutex<Vec<(Namespace, JobId, EvalTrigger)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut ticker = tokio::time::interval(BATCH_WINDOW);

    loop {
        tokio::select! {
            item = rx.recv() => {
                match item {
                    Some(entry) => pending.lock().push(entry),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                flush(&raft, &pending).await;
            }
        }
    }
    flush(&raft, &pending).await;
}

async fn flush(
    raft: &Arc<dyn RaftHandle>,
    pending: &Arc<Mutex<Vec<(Namespace, JobId, EvalTrigger)>>>,
) {
    let batch: Vec<(Namespace, JobId, EvalTrigger)> = {
        let mut guard = pending.lock();
        std::mem::take(&mut *guard)
    };
    if batch.is_empty() {
        return;
    }

    // One trigger per batch: the trigger that appears last wins, matching
    // "a single evaluation creation per affected job" rather than per event.
    let mut seen = HashSet::new();
    let trigger = batch.last().map(|(_, _, t)| *t).unwrap_or(EvalTrigger::AllocHealth);
    let job_ids: Vec<(Namespace, JobId)> = batch
        .into_iter()
        .filter(|(ns, id, _)| seen.insert((ns.clone(), id.clone())))
        .map(|(ns, id, _)| (ns, id))
        .collect();

    if let Err(e) = raft_apply(
        raft.as_ref(),
        RaftRequest::BatchCreateEvaluations { job_ids, trigger },
    )
    .await
    {
        warn!("evaluation batch apply failed: {e}");
    }
}
