// src/core/domain/deployment.rs

use super::ids::{DeploymentId, JobId, Namespace};
use super::indexed::Indices;
use crate::impl_indexed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatusKind {
    Running,
    RunningNeedsPromotion,
    Paused,
    Successful,
    Failed,
    Cancelled,
}

impl DeploymentStatusKind {
    /// Active iff status is running or paused — everything else is terminal.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            DeploymentStatusKind::Running
                | DeploymentStatusKind::RunningNeedsPromotion
                | DeploymentStatusKind::Paused
        )
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentTaskGroup {
    pub desired_total: u32,
    pub desired_canaries: u32,
    pub placed_allocs: u32,
    pub placed_canaries: u32,
    pub healthy_allocs: u32,
    pub unhealthy_allocs: u32,
    pub promoted: bool,
    pub auto_promote: bool,
    pub auto_revert: bool,
    #[serde(with = "humantime_serde")]
    pub progress_deadline: Duration,
    pub require_progress_by: DateTime<Utc>,
}

impl DeploymentTaskGroup {
    pub fn is_done(&self) -> bool {
        self.healthy_allocs >= self.desired_total
    }

    pub fn canaries_healthy(&self) -> bool {
        self.desired_canaries > 0 && self.placed_canaries >= self.desired_canaries && {
            // all placed canaries healthy implies healthy_allocs covers the canary count
            // when no non-canary allocs have been placed yet.
            self.healthy_allocs >= self.desired_canaries
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub namespace: Namespace,
    pub job_id: JobId,
    pub job_version: u64,
    pub status: DeploymentStatusKind,
    pub status_description: String,
    pub task_groups: HashMap<String, DeploymentTaskGroup>,
    #[serde(flatten)]
    pub indices: Indices,
}

impl_indexed!(Deployment);

impl Deployment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// `healthy + unhealthy <= placed <= desired_total` for every task group.
    pub fn invariants_hold(&self) -> bool {
        self.task_groups.values().all(|tg| {
            tg.healthy_allocs + tg.unhealthy_allocs <= tg.placed_allocs
                && tg.placed_allocs <= tg.desired_total
        })
    }

    pub fn needs_promotion(&self) -> bool {
        matches!(self.status, DeploymentStatusKind::RunningNeedsPromotion)
    }

    pub fn all_groups_done_and_promoted(&self) -> bool {
        self.task_groups.values().all(|tg| tg.is_done() && (tg.desired_canaries == 0 || tg.promoted))
    }
}
