// src/core/domain/allocation.rs

use super::ids::{AllocId, DeploymentId, JobId, Namespace, NodeId};
use super::indexed::Indices;
use crate::impl_indexed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
}

impl ClientStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClientStatus::Complete | ClientStatus::Failed | ClientStatus::Lost)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentHealthStatus {
    Healthy,
    Unhealthy,
    Canary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub status: DeploymentHealthStatus,
    pub canary: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocId,
    pub namespace: Namespace,
    pub job_id: JobId,
    pub task_group: String,
    pub node_id: NodeId,
    pub deployment_id: Option<DeploymentId>,
    pub client_status: ClientStatus,
    pub deployment_status: Option<DeploymentStatus>,
    /// Set by the control plane to request the client reschedule/migrate
    /// this allocation. Never set by the client itself.
    pub desired_transition_migrate: bool,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Allocation);

impl Allocation {
    pub fn is_healthy(&self) -> bool {
        matches!(
            &self.deployment_status,
            Some(s) if matches!(s.status, DeploymentHealthStatus::Healthy)
        )
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(
            &self.deployment_status,
            Some(s) if matches!(s.status, DeploymentHealthStatus::Unhealthy)
        )
    }

    pub fn is_canary(&self) -> bool {
        self.deployment_status.as_ref().is_some_and(|s| s.canary)
    }
}
