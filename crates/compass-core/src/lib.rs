//! Core library for the Compass plan/task progress engine.
//!
//! This crate tracks the execution progress of multi-task plans: a
//! centralized in-process store of plans, tasks, evidence, and decisions,
//! dependency-graph analysis over the tasks, and debounced JSON snapshot
//! persistence for crash recovery.
//!
//! # Architecture
//!
//! - **Domain Models** ([`models`]): Plans, tasks, evidence, decisions, and
//!   their statuses; their serialized form is the on-disk snapshot format
//! - **Store** ([`store`]): The single source of truth with synchronous,
//!   ordered event emission toward subscribers
//! - **Graph** ([`graph`]): On-demand dependency analysis (cycle detection,
//!   topological sort, execution order, critical path)
//! - **Persistence** ([`persistence`]): Atomic snapshot files with debounced
//!   auto-save driven by store events
//! - **Manager** ([`manager`]): The facade composing the above, carrying the
//!   retry policy and decision narration
//!
//! The engine does not execute tasks itself; it tracks status and tells
//! callers what is ready to run.
//!
//! # Quick Start
//!
//! ```rust
//! use compass_core::{params::CreateTask, ProgressManagerBuilder, TaskResult};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ProgressManagerBuilder::new().build().await?;
//!
//! let plan = manager.create_plan("write the report", None).await;
//! let outline = manager
//!     .add_task(&plan.plan_id, &CreateTask::new("outline sections"))
//!     .await
//!     .ok_or("plan disappeared")?;
//! let draft = manager
//!     .add_task(
//!         &plan.plan_id,
//!         &CreateTask::new("draft text").with_dependencies(vec![outline.id.clone()]),
//!     )
//!     .await
//!     .ok_or("plan disappeared")?;
//!
//! // The draft waits on the outline.
//! manager
//!     .complete_task(&plan.plan_id, &outline.id, TaskResult::success(None))
//!     .await;
//! let next = manager.next_task(&plan.plan_id).await;
//! assert_eq!(next.map(|t| t.id), Some(draft.id));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod manager;
pub mod models;
pub mod params;
pub mod persistence;
pub mod store;

// Re-export commonly used types
pub use error::{ProgressError, Result};
pub use graph::{CycleInfo, DependencyGraph, DependencyNode, ExecutionOrder};
pub use manager::{ProgressManager, ProgressManagerBuilder};
pub use models::{
    DecisionActor, DecisionKind, DecisionLog, Evidence, EvidenceKind, Plan, PlanStatus,
    PlanSummary, Task, TaskResult, TaskStatus,
};
pub use params::{CreateTask, TaskQuery, UpdateTask};
pub use persistence::{PersistenceConfig, ProgressPersistence};
pub use store::{ListenerId, ProgressStore, StoreEvent, StoreEventKind, StoreEventListener};
