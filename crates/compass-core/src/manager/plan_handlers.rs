//! Plan lifecycle and persistence operations for the ProgressManager.

use std::time::Duration;

use super::ProgressManager;
use crate::error::Result;
use crate::models::{DecisionActor, DecisionKind, Plan, PlanStatus, PlanSummary};
use crate::persistence::DEFAULT_MAX_SNAPSHOT_AGE;
use crate::store::{ListenerId, StoreEventListener};

impl ProgressManager {
    /// Creates a new plan and logs the creation decision.
    pub async fn create_plan(
        &self,
        goal: impl Into<String>,
        strategic_plan: Option<String>,
    ) -> Plan {
        let goal = goal.into();
        let mut store = self.store.lock().await;
        let plan = store.create_plan(goal.clone(), strategic_plan);

        let _ = store.log_decision(
            &plan.plan_id,
            DecisionKind::Plan,
            format!("Created plan for goal: {goal}"),
            "User initiated task",
            DecisionActor::Planner,
            Vec::new(),
        );

        plan
    }

    /// Returns a plan by id.
    pub async fn plan(&self, plan_id: &str) -> Option<Plan> {
        self.store.lock().await.plan(plan_id).cloned()
    }

    /// Whether a plan exists.
    pub async fn has_plan(&self, plan_id: &str) -> bool {
        self.store.lock().await.has_plan(plan_id)
    }

    /// All plans, in creation order.
    pub async fn all_plans(&self) -> Vec<Plan> {
        self.store
            .lock()
            .await
            .all_plans()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sets a plan's status directly.
    pub async fn update_plan_status(&self, plan_id: &str, status: PlanStatus) -> Option<Plan> {
        self.store.lock().await.update_plan_status(plan_id, status)
    }

    /// Transitions a plan into execution.
    pub async fn start_execution(&self, plan_id: &str) -> Option<Plan> {
        self.update_plan_status(plan_id, PlanStatus::Executing).await
    }

    /// Transitions a plan into replanning. This is the only operation that
    /// increments the plan version.
    pub async fn start_replanning(&self, plan_id: &str) -> Option<Plan> {
        let mut store = self.store.lock().await;
        store.update_plan_status(plan_id, PlanStatus::Replanning)?;
        store.increment_plan_version(plan_id)
    }

    /// Marks a plan completed and logs the completion decision.
    pub async fn complete_plan(&self, plan_id: &str) -> Option<Plan> {
        let mut store = self.store.lock().await;
        let plan = store.update_plan_status(plan_id, PlanStatus::Completed)?;

        let _ = store.log_decision(
            plan_id,
            DecisionKind::Plan,
            "Plan completed successfully",
            "All tasks completed",
            DecisionActor::Planner,
            Vec::new(),
        );
        Some(plan)
    }

    /// Marks a plan failed with the given reason.
    pub async fn fail_plan(&self, plan_id: &str, reason: &str) -> Option<Plan> {
        let mut store = self.store.lock().await;
        let plan = store.update_plan_status(plan_id, PlanStatus::Failed)?;

        let _ = store.log_decision(
            plan_id,
            DecisionKind::Abort,
            "Plan failed",
            reason,
            DecisionActor::Planner,
            Vec::new(),
        );
        Some(plan)
    }

    /// Deletes a plan from the store and its snapshot from disk. Returns
    /// whether the plan existed in the store.
    pub async fn delete_plan(&self, plan_id: &str) -> Result<bool> {
        let deleted = self.store.lock().await.delete_plan(plan_id);
        if deleted {
            if let Some(persistence) = &self.persistence {
                persistence.delete(plan_id).await?;
            }
        }
        Ok(deleted)
    }

    // ----- Summary ---------------------------------------------------------

    /// Per-status counts and progress percentage for a plan.
    pub async fn summary(&self, plan_id: &str) -> Option<PlanSummary> {
        self.store.lock().await.summary(plan_id)
    }

    /// Whether every task of the plan is completed or skipped.
    pub async fn is_complete(&self, plan_id: &str) -> bool {
        self.store.lock().await.is_complete(plan_id)
    }

    // ----- Events ----------------------------------------------------------

    /// Subscribes to store events; keep the returned id to unsubscribe.
    pub async fn subscribe(&self, listener: StoreEventListener) -> ListenerId {
        self.store.lock().await.subscribe(listener)
    }

    /// Removes a previously registered listener.
    pub async fn unsubscribe(&self, id: ListenerId) -> bool {
        self.store.lock().await.unsubscribe(id)
    }

    // ----- Persistence -----------------------------------------------------

    /// Saves a plan snapshot to disk immediately.
    pub async fn save_plan(&self, plan_id: &str) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let plan = self.store.lock().await.plan(plan_id).cloned();
        if let Some(plan) = plan {
            persistence.save(&plan).await?;
        }
        Ok(())
    }

    /// Restores a plan snapshot from disk into the store. The restored plan
    /// carries fresh ids; see [`crate::persistence::ProgressPersistence::restore`].
    pub async fn restore_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        let Some(persistence) = &self.persistence else {
            return Ok(None);
        };
        let mut store = self.store.lock().await;
        persistence.restore(&mut store, plan_id).await
    }

    /// Lists the plan ids that have a snapshot on disk.
    pub async fn list_persisted_plans(&self) -> Result<Vec<String>> {
        match &self.persistence {
            Some(persistence) => persistence.list_persisted_plans().await,
            None => Ok(Vec::new()),
        }
    }

    /// Deletes old or terminal snapshots; defaults to a 7-day age threshold.
    /// Returns the number removed.
    pub async fn cleanup_old_plans(&self, max_age: Option<Duration>) -> Result<usize> {
        match &self.persistence {
            Some(persistence) => {
                persistence
                    .cleanup(max_age.unwrap_or(DEFAULT_MAX_SNAPSHOT_AGE))
                    .await
            }
            None => Ok(0),
        }
    }

    /// Performs all pending debounced saves immediately. Call before process
    /// shutdown.
    pub async fn flush(&self) -> Result<()> {
        match &self.persistence {
            Some(persistence) => persistence.flush().await,
            None => Ok(()),
        }
    }

    /// Stops auto-saving and discards pending debounced saves.
    pub async fn disable_auto_save(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.disable_auto_save(&self.store).await;
        }
    }
}
