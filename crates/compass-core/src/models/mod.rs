//! Data models for plans, tasks, evidence, and decisions.
//!
//! This module contains the core domain models of the progress engine. The
//! serde representation of every model doubles as the persisted snapshot
//! format: camelCase field names, lowercase status strings, and numeric
//! epoch-millisecond timestamps.
//!
//! Derived read-model types (dependency nodes, execution order) live in
//! [`crate::graph`] rather than here, since they are rebuilt from tasks on
//! demand and never persisted.

mod decision;
mod evidence;
mod plan;
mod status;
mod summary;
mod task;


pub use decision::{DecisionActor, DecisionKind, DecisionLog};
pub use evidence::{clamp_significance, Evidence, EvidenceKind, MAX_SIGNIFICANCE, MIN_SIGNIFICANCE};
pub use plan::Plan;
pub use status::{PlanStatus, TaskStatus};
pub use summary::PlanSummary;
pub use task::{Task, TaskResult};
