//! Task model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::TaskStatus;

/// Result of a completed, failed, or skipped task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    /// Whether the task succeeded
    pub success: bool,

    /// Output/result data from the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Error message if failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Execution time in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Token usage for this task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,

    /// Timestamp when the result was recorded (epoch milliseconds on the
    /// wire)
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub completed_at: Timestamp,
}

impl TaskResult {
    /// Builds a successful result with optional output text.
    pub fn success(output: Option<String>) -> Self {
        Self {
            success: true,
            output,
            error: None,
            duration_ms: None,
            tokens_used: None,
            completed_at: Timestamp::now(),
        }
    }

    /// Builds a failed result carrying the error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms: None,
            tokens_used: None,
            completed_at: Timestamp::now(),
        }
    }
}

/// An individual unit of work within a plan.
///
/// Dependencies may reference task ids that do not (yet) exist in the plan;
/// dangling references are tolerated and simply never resolve.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (unique within the owning plan)
    pub id: String,

    /// Human-readable task description
    pub description: String,

    /// Current status of the task
    pub status: TaskStatus,

    /// Ids of tasks that must complete before this one
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Agent assigned to execute this task (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,

    /// Result of task execution (present when completed/failed/skipped)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,

    /// Number of retry attempts so far
    pub retry_count: u32,

    /// Maximum retries allowed for this task
    pub max_retries: u32,

    /// Priority level (higher = more urgent)
    pub priority: i32,

    /// Timestamp when the task was created (epoch milliseconds on the wire)
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub created_at: Timestamp,

    /// Timestamp when the task first started running
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "jiff::fmt::serde::timestamp::millisecond::optional"
    )]
    pub started_at: Option<Timestamp>,
}
