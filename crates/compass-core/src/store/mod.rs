//! In-memory progress state store.
//!
//! [`ProgressStore`] is the authoritative, single source of truth for all
//! plan state: plan/task/evidence/decision CRUD, the blocked-to-pending
//! unblock propagation, and synchronous event emission toward observers.
//!
//! The store is designed for single-threaded, cooperative access: every
//! mutation runs to completion before the next begins and there is no
//! internal locking. A multi-threaded host wraps the store in one mutex
//! guarding all operations (the facade in [`crate::manager`] does exactly
//! that).
//!
//! Unknown plan or task ids are not errors here: lookup-based operations
//! return `Option`/empty collections and callers must check.

mod events;


use std::collections::{HashMap, HashSet};

use jiff::Timestamp;
use serde_json::{json, Value};
use uuid::Uuid;

pub use events::{ListenerId, StoreEvent, StoreEventKind, StoreEventListener};

use crate::models::{
    clamp_significance, DecisionActor, DecisionKind, DecisionLog, Evidence, EvidenceKind, Plan,
    PlanStatus, PlanSummary, Task, TaskResult, TaskStatus,
};
use crate::params::{CreateTask, TaskQuery, UpdateTask, DEFAULT_MAX_RETRIES};

use events::ListenerRegistry;

/// Generates an opaque, collision-free id.
fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// In-memory store of all plans, keyed by plan id.
#[derive(Debug, Default)]
pub struct ProgressStore {
    plans: HashMap<String, Plan>,
    /// Plan creation order, for deterministic iteration.
    order: Vec<String>,
    listeners: ListenerRegistry,
}

impl ProgressStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, kind: StoreEventKind, plan_id: &str, task_id: Option<&str>, data: Option<Value>) {
        let event = StoreEvent {
            kind,
            plan_id: plan_id.to_string(),
            task_id: task_id.map(str::to_string),
            timestamp: Timestamp::now(),
            data,
        };
        self.listeners.emit(&event);
    }

    /// Subscribes to store events; keep the returned id to unsubscribe.
    pub fn subscribe(&mut self, listener: StoreEventListener) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    /// Removes a subscription. Returns false when the id is unknown.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ----- Plan operations -------------------------------------------------

    /// Creates a new plan in `planning` status at version 1.
    pub fn create_plan(&mut self, goal: impl Into<String>, strategic_plan: Option<String>) -> Plan {
        let plan_id = generate_id();
        let now = Timestamp::now();

        let plan = Plan {
            plan_id: plan_id.clone(),
            goal: goal.into(),
            version: 1,
            status: PlanStatus::Planning,
            tasks: Vec::new(),
            evidence: Vec::new(),
            decisions: Vec::new(),
            created_at: now,
            updated_at: now,
            strategic_plan,
        };

        self.plans.insert(plan_id.clone(), plan.clone());
        self.order.push(plan_id.clone());
        self.emit(StoreEventKind::PlanCreated, &plan_id, None, None);

        plan
    }

    /// Gets a plan by id.
    pub fn plan(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    /// Whether a plan exists.
    pub fn has_plan(&self, plan_id: &str) -> bool {
        self.plans.contains_key(plan_id)
    }

    /// All plans in creation order.
    pub fn all_plans(&self) -> Vec<&Plan> {
        self.order.iter().filter_map(|id| self.plans.get(id)).collect()
    }

    /// Updates a plan's status and emits `plan:updated`.
    pub fn update_plan_status(&mut self, plan_id: &str, status: PlanStatus) -> Option<Plan> {
        let plan = self.plans.get_mut(plan_id)?;
        plan.status = status;
        plan.updated_at = Timestamp::now();
        let snapshot = plan.clone();

        self.emit(
            StoreEventKind::PlanUpdated,
            plan_id,
            None,
            Some(json!({ "status": status.as_str() })),
        );

        Some(snapshot)
    }

    /// Increments the plan version by one. The facade calls this exactly
    /// once per replanning event; nothing else bumps the version.
    pub fn increment_plan_version(&mut self, plan_id: &str) -> Option<Plan> {
        let plan = self.plans.get_mut(plan_id)?;
        plan.version += 1;
        plan.updated_at = Timestamp::now();
        Some(plan.clone())
    }

    /// Removes a plan entirely. Returns false when the id is unknown.
    pub fn delete_plan(&mut self, plan_id: &str) -> bool {
        let deleted = self.plans.remove(plan_id).is_some();
        if deleted {
            self.order.retain(|id| id != plan_id);
            self.emit(StoreEventKind::PlanDeleted, plan_id, None, None);
        }
        deleted
    }

    /// Drops all plans. Intended for tests.
    pub fn clear(&mut self) {
        self.plans.clear();
        self.order.clear();
    }

    // ----- Task operations -------------------------------------------------

    /// Adds a task to a plan.
    ///
    /// A task with dependencies starts `blocked` unless every listed
    /// dependency is already completed. Dangling dependency ids are
    /// tolerated and leave the task blocked until a matching task completes.
    /// Returns `None` when the plan does not exist.
    pub fn add_task(&mut self, plan_id: &str, params: &CreateTask) -> Option<Task> {
        let plan = self.plans.get_mut(plan_id)?;
        let now = Timestamp::now();

        let mut task = Task {
            id: generate_id(),
            description: params.description.clone(),
            status: TaskStatus::Pending,
            dependencies: params.dependencies.clone(),
            assigned_agent: params.assigned_agent.clone(),
            result: None,
            retry_count: 0,
            max_retries: params.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            priority: params.priority,
            created_at: now,
            started_at: None,
        };

        if !task.dependencies.is_empty() {
            let all_deps_completed = task.dependencies.iter().all(|dep_id| {
                plan.tasks
                    .iter()
                    .any(|t| t.id == *dep_id && t.status == TaskStatus::Completed)
            });
            if !all_deps_completed {
                task.status = TaskStatus::Blocked;
            }
        }

        let task_id = task.id.clone();
        plan.tasks.push(task.clone());
        plan.updated_at = now;

        self.emit(StoreEventKind::TaskCreated, plan_id, Some(&task_id), None);

        Some(task)
    }

    /// Adds several tasks in order; tasks for missing plans are dropped.
    pub fn add_tasks(&mut self, plan_id: &str, params: &[CreateTask]) -> Vec<Task> {
        params
            .iter()
            .filter_map(|p| self.add_task(plan_id, p))
            .collect()
    }

    /// Gets a task by id.
    pub fn task(&self, plan_id: &str, task_id: &str) -> Option<&Task> {
        self.plans.get(plan_id)?.task(task_id)
    }

    /// Filters a plan's tasks by the query.
    pub fn query_tasks(&self, plan_id: &str, query: &TaskQuery) -> Vec<Task> {
        let Some(plan) = self.plans.get(plan_id) else {
            return Vec::new();
        };

        plan.tasks
            .iter()
            .filter(|task| {
                if let Some(statuses) = &query.status {
                    if !statuses.contains(&task.status) {
                        return false;
                    }
                }
                if let Some(agent) = &query.assigned_agent {
                    if task.assigned_agent.as_deref() != Some(agent.as_str()) {
                        return false;
                    }
                }
                if let Some(ids) = &query.ids {
                    if !ids.contains(&task.id) {
                        return false;
                    }
                }
                if let Some(depends_on) = &query.depends_on {
                    if !task.dependencies.iter().any(|d| depends_on.contains(d)) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect()
    }

    /// Applies a partial update to a task and emits the matching event.
    ///
    /// The first transition to `running` stamps `started_at`. A transition
    /// into `completed` emits `task:completed` and runs unblock propagation;
    /// into `failed` emits `task:failed`; anything else emits
    /// `task:updated`. No retry policy is enforced here; the store records
    /// whatever status it is told.
    pub fn update_task(
        &mut self,
        plan_id: &str,
        task_id: &str,
        updates: &UpdateTask,
    ) -> Option<Task> {
        let now = Timestamp::now();
        let (snapshot, previous_status) = {
            let plan = self.plans.get_mut(plan_id)?;
            let task = plan.task_mut(task_id)?;
            let previous_status = task.status;

            if let Some(status) = updates.status {
                task.status = status;
                if status == TaskStatus::Running && task.started_at.is_none() {
                    task.started_at = Some(now);
                }
            }
            if let Some(agent) = &updates.assigned_agent {
                task.assigned_agent = Some(agent.clone());
            }
            if let Some(result) = &updates.result {
                task.result = Some(result.clone());
            }
            if updates.increment_retry {
                task.retry_count += 1;
            }

            let snapshot = task.clone();
            plan.updated_at = now;
            (snapshot, previous_status)
        };

        match snapshot.status {
            TaskStatus::Completed if previous_status != TaskStatus::Completed => {
                self.emit(StoreEventKind::TaskCompleted, plan_id, Some(task_id), None);
                self.propagate_unblock(plan_id, task_id);
            }
            TaskStatus::Failed if previous_status != TaskStatus::Failed => {
                self.emit(StoreEventKind::TaskFailed, plan_id, Some(task_id), None);
            }
            _ => {
                self.emit(StoreEventKind::TaskUpdated, plan_id, Some(task_id), None);
            }
        }

        Some(snapshot)
    }

    // Rewrites task dependency ids through the given map, leaving ids with
    // no mapping untouched. Used when replaying a snapshot, where every task
    // gets a fresh id and the full old-to-new map only exists afterwards.
    pub(crate) fn remap_dependencies(
        &mut self,
        plan_id: &str,
        id_map: &HashMap<String, String>,
    ) {
        let Some(plan) = self.plans.get_mut(plan_id) else {
            return;
        };
        for task in &mut plan.tasks {
            for dep in &mut task.dependencies {
                if let Some(new_id) = id_map.get(dep) {
                    *dep = new_id.clone();
                }
            }
        }
    }

    /// Flips blocked tasks to pending once all their dependencies are
    /// completed or skipped. Called on every completion; a local scan over
    /// the plan's tasks, not a graph rebuild.
    fn propagate_unblock(&mut self, plan_id: &str, completed_task_id: &str) {
        let unblocked: Vec<String> = {
            let Some(plan) = self.plans.get(plan_id) else {
                return;
            };
            let satisfied: HashSet<&str> = plan
                .tasks
                .iter()
                .filter(|t| t.status.is_satisfied())
                .map(|t| t.id.as_str())
                .collect();

            plan.tasks
                .iter()
                .filter(|task| {
                    task.status == TaskStatus::Blocked
                        && task.dependencies.iter().any(|d| d == completed_task_id)
                        && task
                            .dependencies
                            .iter()
                            .all(|d| satisfied.contains(d.as_str()))
                })
                .map(|task| task.id.clone())
                .collect()
        };

        for task_id in unblocked {
            if let Some(plan) = self.plans.get_mut(plan_id) {
                if let Some(task) = plan.task_mut(&task_id) {
                    task.status = TaskStatus::Pending;
                }
            }
            self.emit(StoreEventKind::TaskUnblocked, plan_id, Some(&task_id), None);
        }
    }

    /// Records a completed result for a task.
    pub fn complete_task(
        &mut self,
        plan_id: &str,
        task_id: &str,
        result: TaskResult,
    ) -> Option<Task> {
        self.update_task(
            plan_id,
            task_id,
            &UpdateTask {
                status: Some(TaskStatus::Completed),
                result: Some(result),
                ..UpdateTask::default()
            },
        )
    }

    /// Records a failed result for a task. This is the record-level helper;
    /// the retry policy lives in the facade.
    pub fn fail_task(&mut self, plan_id: &str, task_id: &str, error: &str) -> Option<Task> {
        self.task(plan_id, task_id)?;
        self.update_task(
            plan_id,
            task_id,
            &UpdateTask {
                status: Some(TaskStatus::Failed),
                result: Some(TaskResult::failure(error)),
                ..UpdateTask::default()
            },
        )
    }

    /// The next pending task: highest priority first, ties broken by
    /// earliest creation time.
    pub fn next_task(&self, plan_id: &str) -> Option<Task> {
        let mut pending = self.query_tasks(plan_id, &TaskQuery::with_status(TaskStatus::Pending));
        if pending.is_empty() {
            return None;
        }

        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        pending.into_iter().next()
    }

    // ----- Evidence operations ---------------------------------------------

    /// Records evidence against a task, clamping significance into `1..=10`.
    pub fn add_evidence(
        &mut self,
        plan_id: &str,
        task_id: &str,
        kind: EvidenceKind,
        content: impl Into<String>,
        significance: u8,
    ) -> Option<Evidence> {
        let plan = self.plans.get_mut(plan_id)?;
        let now = Timestamp::now();

        let evidence = Evidence {
            id: generate_id(),
            task_id: task_id.to_string(),
            kind,
            significance: clamp_significance(significance),
            content: content.into(),
            timestamp: now,
            processed: false,
        };

        let evidence_id = evidence.id.clone();
        plan.evidence.push(evidence.clone());
        plan.updated_at = now;

        self.emit(
            StoreEventKind::EvidenceAdded,
            plan_id,
            Some(task_id),
            Some(json!({ "evidenceId": evidence_id })),
        );

        Some(evidence)
    }

    /// Unprocessed evidence, optionally at or above a significance floor.
    pub fn unprocessed_evidence(&self, plan_id: &str, min_significance: Option<u8>) -> Vec<Evidence> {
        let Some(plan) = self.plans.get(plan_id) else {
            return Vec::new();
        };

        plan.evidence
            .iter()
            .filter(|e| !e.processed)
            .filter(|e| min_significance.map_or(true, |min| e.significance >= min))
            .cloned()
            .collect()
    }

    /// Marks the listed evidence entries processed. Idempotent; `processed`
    /// is never reverted.
    pub fn mark_evidence_processed(&mut self, plan_id: &str, evidence_ids: &[String]) {
        let Some(plan) = self.plans.get_mut(plan_id) else {
            return;
        };

        for evidence in &mut plan.evidence {
            if evidence_ids.contains(&evidence.id) {
                evidence.processed = true;
            }
        }
        plan.updated_at = Timestamp::now();
    }

    // ----- Decision logging ------------------------------------------------

    /// Appends a decision to the audit log. Always succeeds when the plan
    /// exists; records are never mutated afterwards.
    pub fn log_decision(
        &mut self,
        plan_id: &str,
        kind: DecisionKind,
        decision: impl Into<String>,
        rationale: impl Into<String>,
        actor: DecisionActor,
        related_task_ids: Vec<String>,
    ) -> Option<DecisionLog> {
        let plan = self.plans.get_mut(plan_id)?;
        let now = Timestamp::now();

        let entry = DecisionLog {
            id: generate_id(),
            kind,
            decision: decision.into(),
            rationale: rationale.into(),
            actor,
            related_task_ids,
            timestamp: now,
        };

        let decision_id = entry.id.clone();
        plan.decisions.push(entry.clone());
        plan.updated_at = now;

        self.emit(
            StoreEventKind::DecisionLogged,
            plan_id,
            None,
            Some(json!({ "decisionId": decision_id })),
        );

        Some(entry)
    }

    // ----- Summary & statistics --------------------------------------------

    /// Per-status counts and progress percentage for a plan.
    pub fn summary(&self, plan_id: &str) -> Option<PlanSummary> {
        self.plans.get(plan_id).map(PlanSummary::from)
    }

    /// True iff the plan has at least one task and every task is completed
    /// or skipped.
    pub fn is_complete(&self, plan_id: &str) -> bool {
        self.plans.get(plan_id).is_some_and(Plan::is_complete)
    }
}
