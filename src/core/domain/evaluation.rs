// src/core/domain/evaluation.rs

use super::ids::{EvalId, JobId, Namespace};
use super::indexed::Indices;
use crate::impl_indexed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalStatus {
    Pending,
    Complete,
    Failed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalTrigger {
    JobRegister,
    AllocHealth,
    DeploymentWatcher,
    NodeUpdate,
    RollingUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvalId,
    pub namespace: Namespace,
    pub priority: i32,
    pub trigger: EvalTrigger,
    pub job_id: JobId,
    /// The node-modify-index this evaluation witnessed at creation time, used
    /// by the scheduler to detect whether the cluster view it reasoned about
    /// is still current.
    pub node_modify_index_witness: u64,
    pub status: EvalStatus,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Evaluation);
