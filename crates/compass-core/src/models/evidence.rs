//! Evidence model definition and related functionality.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Lower bound for evidence significance.
pub const MIN_SIGNIFICANCE: u8 = 1;
/// Upper bound for evidence significance.
pub const MAX_SIGNIFICANCE: u8 = 10;

/// Category of an observation recorded against a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    /// Something new was learned during execution
    Discovery,

    /// An error worth feeding back into planning
    Error,

    /// A limitation that constrains the remaining plan
    Constraint,

    /// A shortcut or improvement surfaced mid-execution
    Opportunity,

    /// Background information for later decisions
    Context,
}

impl FromStr for EvidenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(EvidenceKind::Discovery),
            "error" => Ok(EvidenceKind::Error),
            "constraint" => Ok(EvidenceKind::Constraint),
            "opportunity" => Ok(EvidenceKind::Opportunity),
            "context" => Ok(EvidenceKind::Context),
            _ => Err(format!("Invalid evidence kind: {s}")),
        }
    }
}

/// An observation discovered during task execution, used to inform
/// replanning decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Unique identifier for this evidence
    pub id: String,

    /// Id of the task that produced this evidence
    pub task_id: String,

    /// Category of the observation
    #[serde(rename = "type")]
    pub kind: EvidenceKind,

    /// Significance level, always within `1..=10`
    pub significance: u8,

    /// Description of what was observed
    pub content: String,

    /// Timestamp when the evidence was recorded (epoch milliseconds on the
    /// wire)
    #[serde(with = "jiff::fmt::serde::timestamp::millisecond::required")]
    pub timestamp: Timestamp,

    /// Whether the planner has already consumed this evidence. Once set, it
    /// is never reverted.
    #[serde(default)]
    pub processed: bool,
}

/// Clamps a raw significance value into the valid `1..=10` range.
pub fn clamp_significance(value: u8) -> u8 {
    value.clamp(MIN_SIGNIFICANCE, MAX_SIGNIFICANCE)
}
