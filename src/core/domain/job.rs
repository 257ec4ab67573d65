// src/core/domain/job.rs

use super::ids::{JobId, Namespace};
use super::indexed::Indices;
use crate::impl_indexed;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scalable unit within a job. Shapes only — the scheduler owns placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroup {
    pub name: String,
    pub count: u32,
    pub tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub namespace: Namespace,
    pub name: String,
    pub version: u64,
    pub priority: i32,
    pub node_pool: String,
    pub task_groups: Vec<TaskGroup>,
    /// Opaque caller-supplied key/value metadata. Used by the rollback logic
    /// to detect whether two job versions share the same specification: a
    /// hash over `task_groups` plus `meta` stands in for a full deep-equal.
    pub meta: HashMap<String, String>,
    pub stable: bool,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Job);

impl Job {
    /// A stable content hash over everything that defines "the same spec",
    /// used by the deployment watcher's rollback logic (spec.md 4.6.2) to
    /// decide whether a prior stable version is actually different.
    pub fn spec_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        self.priority.hash(&mut hasher);
        self.node_pool.hash(&mut hasher);
        for tg in &self.task_groups {
            tg.name.hash(&mut hasher);
            tg.count.hash(&mut hasher);
            tg.tasks.hash(&mut hasher);
        }
        let mut meta_keys: Vec<_> = self.meta.iter().collect();
        meta_keys.sort();
        for (k, v) in meta_keys {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        hasher.finish()
    }
}
