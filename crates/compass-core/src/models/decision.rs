//! Decision log model definition.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Kind of decision recorded in the audit log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    /// Initial plan construction
    Plan,

    /// Plan revision after new evidence
    Replan,

    /// Task assignment or completion narration
    Assign,

    /// A failed task was scheduled for another attempt
    Retry,

    /// A task was skipped deliberately
    Skip,

    /// A task or plan was abandoned
    Abort,
}

impl FromStr for DecisionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plan" => Ok(DecisionKind::Plan),
            "replan" => Ok(DecisionKind::Replan),
            "assign" => Ok(DecisionKind::Assign),
            "retry" => Ok(DecisionKind::Retry),
            "skip" => Ok(DecisionKind::Skip),
            "abort" => Ok(DecisionKind::Abort),
            _ => Err(format!("Invalid decision kind: {s}")),
        }
    }
}

/// Component that made a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionActor {
    /// The planning agent
    Planner,

    /// The agent factory
    Factory,

    /// The executing agent
    Executor,

    /// An automatic trigger (e.g. replan threshold)
    Trigger,
}

/// An immutable audit record of a planning or execution decision.
///
/// Decision records are append-only: once logged they are never mutated or
/// deleted for the lifetime of the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLog {
    /// Unique identifier for this decision
    pub id: String,

    /// Kind of decision
    #[serde(rename = "type")]
    pub kind: DecisionKind,

    /// What decision was made
    pub decision: String,

    /// Why this decision was made
    pub rationale: String,

    /// Component that made the decision
    pub actor: DecisionActor,

    /// Related task ids (if any)
    #[serde(default)]
    pub related_task_ids: Vec<String>,

    /// Timestamp when the decision was made (epoch milliseconds on the wire)
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub timestamp: Timestamp,
}
