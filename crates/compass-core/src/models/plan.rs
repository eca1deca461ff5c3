//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{DecisionLog, Evidence, PlanStatus, Task};

/// The root aggregate: a goal plus its tasks, evidence, and decision log.
///
/// The serialized form of this struct is the persisted snapshot format:
/// camelCase field names with numeric epoch-millisecond timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Unique identifier for the plan (opaque, never reused)
    pub plan_id: String,

    /// Original goal/request from the caller
    pub goal: String,

    /// Plan version, starts at 1 and increments exactly once per replanning
    /// event
    pub version: u32,

    /// Current plan status
    pub status: PlanStatus,

    /// All tasks in the plan, in creation order
    pub tasks: Vec<Task>,

    /// Evidence discovered during execution, in recording order
    #[serde(default)]
    pub evidence: Vec<Evidence>,

    /// Append-only decision log
    #[serde(default)]
    pub decisions: Vec<DecisionLog>,

    /// Timestamp when the plan was created (epoch milliseconds on the wire)
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub created_at: Timestamp,

    /// Timestamp of the last state update; always `>= created_at`
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub updated_at: Timestamp,

    /// High-level strategy summary (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategic_plan: Option<String>,
}

impl Plan {
    /// Looks up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Looks up a task by id, mutably.
    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// A plan is complete iff it has at least one task and every task is
    /// completed or skipped.
    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status.is_satisfied())
    }
}
