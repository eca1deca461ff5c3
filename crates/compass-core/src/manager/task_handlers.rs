//! Task, graph, evidence, and decision operations for the ProgressManager.

use super::ProgressManager;
use crate::graph::{CycleInfo, DependencyGraph, ExecutionOrder};
use crate::models::{
    DecisionActor, DecisionKind, DecisionLog, Evidence, EvidenceKind, Task, TaskResult, TaskStatus,
};
use crate::params::{CreateTask, TaskQuery, UpdateTask};

impl ProgressManager {
    // ----- Task operations -------------------------------------------------

    /// Adds a task to a plan. Returns `None` for an unknown plan.
    pub async fn add_task(&self, plan_id: &str, params: &CreateTask) -> Option<Task> {
        self.store.lock().await.add_task(plan_id, params)
    }

    /// Adds several tasks in order. Later tasks may depend on earlier ones in
    /// the same batch.
    pub async fn add_tasks(&self, plan_id: &str, params: &[CreateTask]) -> Vec<Task> {
        self.store.lock().await.add_tasks(plan_id, params)
    }

    /// Returns a task by id.
    pub async fn task(&self, plan_id: &str, task_id: &str) -> Option<Task> {
        self.store.lock().await.task(plan_id, task_id).cloned()
    }

    /// Queries tasks with composable filters.
    pub async fn query_tasks(&self, plan_id: &str, query: &TaskQuery) -> Vec<Task> {
        self.store.lock().await.query_tasks(plan_id, query)
    }

    /// Applies a partial update to a task.
    pub async fn update_task(
        &self,
        plan_id: &str,
        task_id: &str,
        updates: &UpdateTask,
    ) -> Option<Task> {
        self.store.lock().await.update_task(plan_id, task_id, updates)
    }

    /// Marks a task running, optionally assigning an agent. The first such
    /// transition stamps the task's start time.
    pub async fn start_task(
        &self,
        plan_id: &str,
        task_id: &str,
        agent: Option<&str>,
    ) -> Option<Task> {
        self.store.lock().await.update_task(
            plan_id,
            task_id,
            &UpdateTask {
                status: Some(TaskStatus::Running),
                assigned_agent: agent.map(str::to_string),
                ..UpdateTask::default()
            },
        )
    }

    /// Completes a task with its result, logs the completion decision, and
    /// completes the whole plan when this was the last outstanding task.
    pub async fn complete_task(
        &self,
        plan_id: &str,
        task_id: &str,
        result: TaskResult,
    ) -> Option<Task> {
        let rationale = result
            .output
            .clone()
            .unwrap_or_else(|| "Success".to_string());

        let (task, plan_done) = {
            let mut store = self.store.lock().await;
            let task = store.complete_task(plan_id, task_id, result)?;

            let _ = store.log_decision(
                plan_id,
                DecisionKind::Assign,
                format!("Task completed: {}", task.description),
                rationale,
                DecisionActor::Executor,
                vec![task_id.to_string()],
            );

            (task, store.is_complete(plan_id))
        };

        if plan_done {
            let _ = self.complete_plan(plan_id).await;
        }

        Some(task)
    }

    /// Fails a task, applying the retry policy: below the retry budget the
    /// task goes back to `pending` with its retry count incremented; once the
    /// budget is exhausted it transitions to `failed` and high-significance
    /// error evidence is recorded, which may trigger replanning.
    pub async fn fail_task(&self, plan_id: &str, task_id: &str, error: &str) -> Option<Task> {
        let mut store = self.store.lock().await;
        let task = store.task(plan_id, task_id)?.clone();

        if task.retry_count < task.max_retries {
            let retried = store.update_task(
                plan_id,
                task_id,
                &UpdateTask {
                    status: Some(TaskStatus::Pending),
                    increment_retry: true,
                    ..UpdateTask::default()
                },
            );

            let _ = store.log_decision(
                plan_id,
                DecisionKind::Retry,
                format!("Retrying task: {}", task.description),
                format!(
                    "Attempt {}/{}. Error: {error}",
                    task.retry_count + 1,
                    task.max_retries
                ),
                DecisionActor::Executor,
                vec![task_id.to_string()],
            );

            return retried;
        }

        let failed = store.fail_task(plan_id, task_id, error)?;

        let _ = store.log_decision(
            plan_id,
            DecisionKind::Abort,
            format!("Task failed: {}", task.description),
            format!("Max retries ({}) exceeded. Error: {error}", task.max_retries),
            DecisionActor::Executor,
            vec![task_id.to_string()],
        );

        let _ = store.add_evidence(
            plan_id,
            task_id,
            EvidenceKind::Error,
            format!("Task failed after {} retries: {error}", task.max_retries),
            8,
        );

        Some(failed)
    }

    /// Skips a task with a reason, recording a synthetic successful result so
    /// the task still counts toward plan completion.
    pub async fn skip_task(&self, plan_id: &str, task_id: &str, reason: &str) -> Option<Task> {
        let mut store = self.store.lock().await;
        let task = store.update_task(
            plan_id,
            task_id,
            &UpdateTask {
                status: Some(TaskStatus::Skipped),
                result: Some(TaskResult::success(Some(format!("Skipped: {reason}")))),
                ..UpdateTask::default()
            },
        )?;

        let _ = store.log_decision(
            plan_id,
            DecisionKind::Skip,
            format!("Skipped task: {}", task.description),
            reason,
            DecisionActor::Planner,
            vec![task_id.to_string()],
        );

        Some(task)
    }

    /// The next pending task: highest priority first, ties broken by earliest
    /// creation time.
    pub async fn next_task(&self, plan_id: &str) -> Option<Task> {
        self.store.lock().await.next_task(plan_id)
    }

    // ----- Dependency graph ------------------------------------------------

    /// Builds the dependency graph for a plan's current tasks.
    pub async fn dependency_graph(&self, plan_id: &str) -> Option<DependencyGraph> {
        let store = self.store.lock().await;
        let plan = store.plan(plan_id)?;
        Some(DependencyGraph::from_tasks(&plan.tasks))
    }

    /// Ready/waiting/blocked partition plus a dependency-respecting order.
    pub async fn execution_order(&self, plan_id: &str) -> Option<ExecutionOrder> {
        Some(self.dependency_graph(plan_id).await?.execution_order())
    }

    /// Checks the plan's dependency graph for cycles.
    pub async fn detect_cycles(&self, plan_id: &str) -> Option<CycleInfo> {
        Some(self.dependency_graph(plan_id).await?.detect_cycle())
    }

    /// Ids of all tasks transitively blocked by a failed task.
    pub async fn blocked_by_failure(&self, plan_id: &str, failed_task_id: &str) -> Vec<String> {
        match self.dependency_graph(plan_id).await {
            Some(graph) => graph.blocked_by_failure(failed_task_id),
            None => Vec::new(),
        }
    }

    // ----- Evidence --------------------------------------------------------

    /// Records evidence against a task; significance is clamped to `1..=10`.
    pub async fn add_evidence(
        &self,
        plan_id: &str,
        task_id: &str,
        kind: EvidenceKind,
        content: impl Into<String>,
        significance: u8,
    ) -> Option<Evidence> {
        self.store
            .lock()
            .await
            .add_evidence(plan_id, task_id, kind, content, significance)
    }

    /// Unprocessed evidence, optionally filtered by minimum significance.
    pub async fn unprocessed_evidence(
        &self,
        plan_id: &str,
        min_significance: Option<u8>,
    ) -> Vec<Evidence> {
        self.store
            .lock()
            .await
            .unprocessed_evidence(plan_id, min_significance)
    }

    /// Marks evidence entries as processed. Idempotent.
    pub async fn mark_evidence_processed(&self, plan_id: &str, evidence_ids: &[String]) {
        self.store
            .lock()
            .await
            .mark_evidence_processed(plan_id, evidence_ids);
    }

    // ----- Decisions -------------------------------------------------------

    /// Appends a decision to the plan's audit log.
    pub async fn log_decision(
        &self,
        plan_id: &str,
        kind: DecisionKind,
        decision: impl Into<String>,
        rationale: impl Into<String>,
        actor: DecisionActor,
        related_task_ids: Vec<String>,
    ) -> Option<DecisionLog> {
        self.store
            .lock()
            .await
            .log_decision(plan_id, kind, decision, rationale, actor, related_task_ids)
    }
}
