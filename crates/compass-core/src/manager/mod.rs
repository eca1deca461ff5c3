//! High-level progress management API.
//!
//! This module provides the main [`ProgressManager`] interface, the facade
//! composing the in-memory store, snapshot persistence, and dependency-graph
//! analysis into one API surface for callers (planner and executor agents,
//! host processes).
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │ ProgressManager │───▶│  ProgressStore  │───▶│ store listeners │
//! │    (facade)     │    │ (source of truth│    │  (auto-save,    │
//! │                 │    │   + events)     │    │   observers)    │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!         │
//!         ├──▶ DependencyGraph   built on demand from store snapshots
//!         └──▶ ProgressPersistence   debounced JSON snapshots on disk
//! ```
//!
//! Policy that lives here rather than in the store: decision narration for
//! plan/task transitions, the retry-or-fail choice on task failure, and the
//! automatic plan completion check after each task completion.
//!
//! ## Submodules
//!
//! - [`builder`]: Factory for creating [`ProgressManager`] instances
//! - `plan_handlers`: Plan lifecycle and persistence operations
//! - `task_handlers`: Task, graph, evidence, and decision operations
//!
//! # Usage
//!
//! ```rust,no_run
//! use compass_core::{params::CreateTask, ProgressManagerBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ProgressManagerBuilder::new()
//!     .with_persistence_root("/home/user/project")
//!     .build()
//!     .await?;
//!
//! let plan = manager.create_plan("ship the feature", None).await;
//! let task = manager
//!     .add_task(&plan.plan_id, &CreateTask::new("write the code"))
//!     .await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::persistence::ProgressPersistence;
use crate::store::ProgressStore;

pub mod builder;
pub mod plan_handlers;
pub mod task_handlers;

#[cfg(test)]
mod tests;

pub use builder::ProgressManagerBuilder;

/// Central facade for all progress management operations.
///
/// The wrapped store is guarded by a single mutex; every operation locks it
/// for the duration of the mutation, which gives multi-threaded hosts the
/// single-writer semantics the store requires.
pub struct ProgressManager {
    pub(crate) store: Arc<Mutex<ProgressStore>>,
    pub(crate) persistence: Option<Arc<ProgressPersistence>>,
}

impl ProgressManager {
    pub(crate) fn new(
        store: Arc<Mutex<ProgressStore>>,
        persistence: Option<Arc<ProgressPersistence>>,
    ) -> Self {
        Self { store, persistence }
    }
}

impl std::fmt::Debug for ProgressManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressManager")
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}
