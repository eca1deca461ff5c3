//! Tests for the ProgressManager facade.

use super::*;
use crate::models::{DecisionKind, EvidenceKind, PlanStatus, TaskResult, TaskStatus};
use crate::params::CreateTask;

async fn in_memory_manager() -> ProgressManager {
    ProgressManagerBuilder::new()
        .build()
        .await
        .expect("in-memory build cannot fail")
}

#[tokio::test]
async fn create_plan_logs_creation_decision() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("paint the shed", None).await;

    let stored = manager.plan(&plan.plan_id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Planning);
    assert_eq!(stored.decisions.len(), 1);
    assert_eq!(stored.decisions[0].kind, DecisionKind::Plan);
    assert!(stored.decisions[0].decision.contains("paint the shed"));
}

#[tokio::test]
async fn retry_policy_retries_then_fails() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("flaky work", None).await;
    let task = manager
        .add_task(&plan.plan_id, &CreateTask::new("flaky").with_max_retries(1))
        .await
        .unwrap();

    // First failure: within budget, goes back to pending.
    let retried = manager
        .fail_task(&plan.plan_id, &task.id, "timeout")
        .await
        .unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);
    assert_eq!(retried.retry_count, 1);

    // Second failure: budget exhausted, task fails for good.
    let failed = manager
        .fail_task(&plan.plan_id, &task.id, "timeout again")
        .await
        .unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);

    let stored = manager.plan(&plan.plan_id).await.unwrap();
    let kinds: Vec<DecisionKind> = stored.decisions.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DecisionKind::Retry));
    assert!(kinds.contains(&DecisionKind::Abort));

    // The terminal failure leaves high-significance error evidence behind.
    let evidence = manager.unprocessed_evidence(&plan.plan_id, Some(8)).await;
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].kind, EvidenceKind::Error);
    assert_eq!(evidence[0].significance, 8);
}

#[tokio::test]
async fn completing_last_task_completes_plan() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("two steps", None).await;
    let a = manager
        .add_task(&plan.plan_id, &CreateTask::new("a"))
        .await
        .unwrap();
    let b = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("b").with_dependencies(vec![a.id.clone()]),
        )
        .await
        .unwrap();

    manager
        .complete_task(&plan.plan_id, &a.id, TaskResult::success(None))
        .await
        .unwrap();
    let stored = manager.plan(&plan.plan_id).await.unwrap();
    assert_ne!(stored.status, PlanStatus::Completed);

    manager
        .complete_task(&plan.plan_id, &b.id, TaskResult::success(None))
        .await
        .unwrap();
    let stored = manager.plan(&plan.plan_id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Completed);
    assert!(stored
        .decisions
        .iter()
        .any(|d| d.decision == "Plan completed successfully"));
}

#[tokio::test]
async fn skip_records_synthetic_success_and_counts_toward_completion() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("skippable", None).await;
    let task = manager
        .add_task(&plan.plan_id, &CreateTask::new("optional step"))
        .await
        .unwrap();

    let skipped = manager
        .skip_task(&plan.plan_id, &task.id, "no longer needed")
        .await
        .unwrap();
    assert_eq!(skipped.status, TaskStatus::Skipped);
    let result = skipped.result.unwrap();
    assert!(result.success);
    assert_eq!(result.output.as_deref(), Some("Skipped: no longer needed"));

    assert!(manager.is_complete(&plan.plan_id).await);
}

#[tokio::test]
async fn start_replanning_increments_version_once() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("evolving", None).await;
    assert_eq!(plan.version, 1);

    let replanning = manager.start_replanning(&plan.plan_id).await.unwrap();
    assert_eq!(replanning.status, PlanStatus::Replanning);
    assert_eq!(replanning.version, 2);

    // Other status transitions never touch the version.
    let executing = manager.start_execution(&plan.plan_id).await.unwrap();
    assert_eq!(executing.version, 2);
}

#[tokio::test]
async fn start_task_assigns_agent_and_runs() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("delegated", None).await;
    let task = manager
        .add_task(&plan.plan_id, &CreateTask::new("handled elsewhere"))
        .await
        .unwrap();

    let started = manager
        .start_task(&plan.plan_id, &task.id, Some("builder"))
        .await
        .unwrap();
    assert_eq!(started.status, TaskStatus::Running);
    assert_eq!(started.assigned_agent.as_deref(), Some("builder"));
    assert!(started.started_at.is_some());
}

#[tokio::test]
async fn graph_conveniences_reflect_store_state() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("graphed", None).await;
    let a = manager
        .add_task(&plan.plan_id, &CreateTask::new("a"))
        .await
        .unwrap();
    let b = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("b").with_dependencies(vec![a.id.clone()]),
        )
        .await
        .unwrap();

    let cycle = manager.detect_cycles(&plan.plan_id).await.unwrap();
    assert!(!cycle.has_cycle);

    let order = manager.execution_order(&plan.plan_id).await.unwrap();
    assert_eq!(order.ready, vec![a.id.clone()]);
    assert_eq!(order.waiting, vec![b.id.clone()]);

    let downstream = manager.blocked_by_failure(&plan.plan_id, &a.id).await;
    assert_eq!(downstream, vec![b.id.clone()]);
}

#[tokio::test]
async fn fail_plan_records_reason() {
    let manager = in_memory_manager().await;
    let plan = manager.create_plan("doomed", None).await;

    let failed = manager
        .fail_plan(&plan.plan_id, "requirements withdrawn")
        .await
        .unwrap();
    assert_eq!(failed.status, PlanStatus::Failed);

    let stored = manager.plan(&plan.plan_id).await.unwrap();
    let abort = stored
        .decisions
        .iter()
        .find(|d| d.kind == DecisionKind::Abort)
        .unwrap();
    assert_eq!(abort.rationale, "requirements withdrawn");
}
