// src/core/blocking/mod.rs

//! The blocking query engine: re-runs a read when the tables/rows it
//! touched change, or when `max_query_time` elapses. Grounded on
//! `spineldb::core::blocking::BlockerManager::wait_with_polling` (a
//! `tokio::time::timeout` race against a wakeup channel), generalized from
//! "wake one waiter with a value" to "re-run an arbitrary read against a
//! fresh snapshot".

use crate::core::state_store::watch::WatchSet;
use crate::core::state_store::StateStore;
use rand::Rng;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Caller-supplied blocking parameters, mirroring the `query_options` on the
/// common request envelope (spec.md §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    pub min_query_index: u64,
    pub max_query_time: Option<Duration>,
    pub allow_stale: bool,
}

/// What every blocking read returns alongside its payload.
#[derive(Debug, Clone, Copy)]
pub struct QueryMeta {
    pub index: u64,
}

const DEFAULT_MAX_QUERY_TIME: Duration = Duration::from_secs(300);
/// Jitter bound added to `max_query_time` so that many clients blocked on the
/// same watch set don't all retry in lockstep.
const MAX_JITTER: Duration = Duration::from_millis(2000);

/// The result of one invocation of the read closure: the payload, the index
/// it should be considered current as of, and the watch set it touched.
pub struct QueryResult<T> {
    pub payload: T,
    pub index: u64,
    pub watch_set: WatchSet,
}

/// Runs `query` against `store`, blocking and re-running it until either the
/// result's index exceeds `opts.min_query_index`, `max_query_time` elapses
/// (jittered), or `cancel` fires.
///
/// `query` is re-invoked on a fresh snapshot every time a watched subject
/// fires; it must be cheap and side-effect free.
pub async fn run<T, F>(
    store: &StateStore,
    opts: QueryOptions,
    cancel: &CancellationToken,
    mut query: F,
) -> (T, QueryMeta)
where
    F: FnMut(&StateStore) -> QueryResult<T>,
{
    let deadline = opts.max_query_time.unwrap_or(DEFAULT_MAX_QUERY_TIME);
    let jitter = if deadline.is_zero() {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64))
    };
    let wait_budget = deadline + jitter;

    loop {
        let result = query(store);
        // Arm listeners against every subject this read touched before doing
        // anything else with the result. `Notify::notify_waiters` only wakes
        // listeners that exist at the moment it's called, so a commit landing
        // between the read above and a listener constructed later would be
        // missed; arming here first closes that window.
        let armed = result.watch_set.arm();
        // Reply-index floor of 1: a reply never claims "nothing has ever
        // happened" even against an empty store.
        let index = result.index.max(1);

        if opts.min_query_index == 0 || index > opts.min_query_index {
            return (result.payload, QueryMeta { index });
        }

        if armed.is_empty() {
            // Nothing to watch for — this read will never change on its own;
            // honor the timeout and return what we have.
            tokio::time::sleep(wait_budget).await;
            let result = query(store);
            let index = result.index.max(1);
            return (result.payload, QueryMeta { index });
        }

        tokio::select! {
            _ = armed.wait() => {
                // Loop and re-run the query against a fresh snapshot.
            }
            _ = tokio::time::sleep(wait_budget) => {
                let result = query(store);
                let index = result.index.max(1);
                return (result.payload, QueryMeta { index });
            }
            _ = cancel.cancelled() => {
                let result = query(store);
                let index = result.index.max(1);
                return (result.payload, QueryMeta { index });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{Job, JobId, Namespace, TaskGroup};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn sample_job(ns: &Namespace, id: &str) -> Job {
        Job {
            id: JobId(id.to_string()),
            namespace: ns.clone(),
            name: id.to_string(),
            version: 0,
            priority: 50,
            node_pool: "default".into(),
            task_groups: vec![TaskGroup {
                name: "web".into(),
                count: 1,
                tasks: vec!["server".into()],
            }],
            meta: HashMap::new(),
            stable: true,
            indices: Default::default(),
        }
    }

    #[tokio::test]
    async fn returns_immediately_when_index_already_advanced() {
        let store = StateStore::new();
        let ns = Namespace::default_namespace();
        store.upsert_job(sample_job(&ns, "web"), 5);

        let cancel = CancellationToken::new();
        let (found, meta) = run(
            &store,
            QueryOptions {
                min_query_index: 0,
                max_query_time: Some(Duration::from_millis(50)),
                allow_stale: false,
            },
            &cancel,
            |s| {
                let mut ws = WatchSet::new();
                s.watch_job(&ns, &JobId("web".into()), &mut ws);
                let job = s.get_job(&ns, &JobId("web".into()));
                QueryResult {
                    payload: job,
                    index: s.jobs.table_index(),
                    watch_set: ws,
                }
            },
        )
        .await;

        assert!(found.is_some());
        assert_eq!(meta.index, 5);
    }

    #[tokio::test]
    async fn wakes_on_write_before_timeout() {
        let store = Arc::new(StateStore::new());
        let ns = Namespace::default_namespace();
        store.upsert_job(sample_job(&ns, "web"), 1);

        let cancel = CancellationToken::new();
        let store_writer = store.clone();
        let ns_writer = ns.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store_writer.upsert_job(sample_job(&ns_writer, "web"), 2);
        });

        let (_, meta) = run(
            &store,
            QueryOptions {
                min_query_index: 1,
                max_query_time: Some(Duration::from_secs(5)),
                allow_stale: false,
            },
            &cancel,
            |s| {
                let mut ws = WatchSet::new();
                s.watch_job(&ns, &JobId("web".into()), &mut ws);
                QueryResult {
                    payload: (),
                    index: s.jobs.table_index(),
                    watch_set: ws,
                }
            },
        )
        .await;

        writer.await.unwrap();
        assert_eq!(meta.index, 2);
    }
}
