//! Plan summary types and functionality.

use serde::{Deserialize, Serialize};

use super::{Plan, PlanStatus, TaskStatus};

/// Evidence at or above this significance counts as pending replan input.
const REPLAN_SIGNIFICANCE_THRESHOLD: u8 = 5;

/// Summary statistics for a plan's progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    /// Plan id
    pub plan_id: String,
    /// Current plan status
    pub status: PlanStatus,
    /// Total number of tasks
    pub total_tasks: u32,
    /// Number of completed tasks
    pub completed_tasks: u32,
    /// Number of failed tasks
    pub failed_tasks: u32,
    /// Number of blocked tasks
    pub blocked_tasks: u32,
    /// Number of pending tasks
    pub pending_tasks: u32,
    /// Number of running tasks
    pub running_tasks: u32,
    /// Completion percentage, rounded, 0 when the plan has no tasks
    pub progress_percent: u32,
    /// Unprocessed evidence entries with significance >= 5
    pub pending_evidence_count: u32,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        let count = |status: TaskStatus| {
            plan.tasks.iter().filter(|t| t.status == status).count() as u32
        };

        let total_tasks = plan.tasks.len() as u32;
        let completed_tasks = count(TaskStatus::Completed);

        let progress_percent = if total_tasks > 0 {
            ((f64::from(completed_tasks) / f64::from(total_tasks)) * 100.0).round() as u32
        } else {
            0
        };

        let pending_evidence_count = plan
            .evidence
            .iter()
            .filter(|e| !e.processed && e.significance >= REPLAN_SIGNIFICANCE_THRESHOLD)
            .count() as u32;

        Self {
            plan_id: plan.plan_id.clone(),
            status: plan.status,
            total_tasks,
            completed_tasks,
            failed_tasks: count(TaskStatus::Failed),
            blocked_tasks: count(TaskStatus::Blocked),
            pending_tasks: count(TaskStatus::Pending),
            running_tasks: count(TaskStatus::Running),
            progress_percent,
            pending_evidence_count,
        }
    }
}
