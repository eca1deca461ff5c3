//! Parameter structures for progress engine operations.
//!
//! These structs carry operation inputs across the facade boundary without
//! framework-specific derives, so host layers (HTTP handlers, CLIs, agent
//! runtimes) can wrap them with whatever derive set their framework needs
//! and convert via `Into`.

use serde::{Deserialize, Serialize};

use crate::models::{TaskResult, TaskStatus};

/// Default number of retries granted to a new task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Options for creating a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    /// Task description
    pub description: String,

    /// Ids of tasks that must complete first. May reference tasks that do
    /// not exist yet; dangling ids are tolerated.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Priority level (higher = more urgent)
    #[serde(default)]
    pub priority: i32,

    /// Maximum retry attempts; defaults to 3 when unset
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Pre-assigned agent
    #[serde(default)]
    pub assigned_agent: Option<String>,
}

impl CreateTask {
    /// Convenience constructor for a task with just a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            dependencies: Vec::new(),
            priority: 0,
            max_retries: None,
            assigned_agent: None,
        }
    }

    /// Sets the dependency list.
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the pre-assigned agent.
    pub fn with_assigned_agent(mut self, agent: impl Into<String>) -> Self {
        self.assigned_agent = Some(agent.into());
        self
    }
}

/// Partial update applied to an existing task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    /// New status
    pub status: Option<TaskStatus>,

    /// Assigned agent
    pub assigned_agent: Option<String>,

    /// Task result (for completed/failed/skipped)
    pub result: Option<TaskResult>,

    /// Increment the retry count by exactly one
    #[serde(default)]
    pub increment_retry: bool,
}

/// Query options for filtering tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    /// Keep only tasks in one of these statuses
    pub status: Option<Vec<TaskStatus>>,

    /// Keep only tasks assigned to this agent
    pub assigned_agent: Option<String>,

    /// Keep only tasks with these ids
    pub ids: Option<Vec<String>>,

    /// Keep only tasks that depend on any of these task ids
    pub depends_on: Option<Vec<String>>,
}

impl TaskQuery {
    /// Query for tasks in a single status.
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(vec![status]),
            ..Self::default()
        }
    }
}
