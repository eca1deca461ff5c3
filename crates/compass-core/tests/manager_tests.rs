//! Integration tests for the full plan workflow through the manager.

mod common;

use compass_core::params::{CreateTask, TaskQuery};
use compass_core::{PlanStatus, TaskResult, TaskStatus};
use common::create_test_manager;

#[tokio::test]
async fn dependent_task_unblocks_and_becomes_ready() {
    let (_temp_dir, manager) = create_test_manager().await;

    let plan = manager.create_plan("two-stage build", None).await;
    let a = manager
        .add_task(&plan.plan_id, &CreateTask::new("compile"))
        .await
        .expect("Failed to add task");
    let b = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("link").with_dependencies(vec![a.id.clone()]),
        )
        .await
        .expect("Failed to add task");

    // B waits on A at creation.
    assert_eq!(b.status, TaskStatus::Blocked);
    let order = manager.execution_order(&plan.plan_id).await.unwrap();
    assert_eq!(order.ready, vec![a.id.clone()]);
    assert_eq!(order.waiting, vec![b.id.clone()]);

    manager
        .complete_task(&plan.plan_id, &a.id, TaskResult::success(None))
        .await
        .expect("Failed to complete task");

    let b_after = manager.task(&plan.plan_id, &b.id).await.unwrap();
    assert_eq!(b_after.status, TaskStatus::Pending);
    let order = manager.execution_order(&plan.plan_id).await.unwrap();
    assert!(order.ready.contains(&b.id));
}

#[tokio::test]
async fn full_workflow_from_planning_to_completion() {
    let (_temp_dir, manager) = create_test_manager().await;

    let plan = manager
        .create_plan("release v2", Some("build, verify, ship".to_string()))
        .await;

    let tasks = manager
        .add_tasks(
            &plan.plan_id,
            &[
                CreateTask::new("build artifacts").with_priority(2),
                CreateTask::new("run tests").with_priority(1),
            ],
        )
        .await;
    assert_eq!(tasks.len(), 2);

    manager.start_execution(&plan.plan_id).await.unwrap();

    // Priority decides who goes first.
    let next = manager.next_task(&plan.plan_id).await.unwrap();
    assert_eq!(next.description, "build artifacts");

    manager
        .start_task(&plan.plan_id, &next.id, Some("builder"))
        .await
        .unwrap();
    manager
        .complete_task(
            &plan.plan_id,
            &next.id,
            TaskResult::success(Some("artifacts at dist/".to_string())),
        )
        .await
        .unwrap();

    let remaining = manager
        .query_tasks(&plan.plan_id, &TaskQuery::with_status(TaskStatus::Pending))
        .await;
    assert_eq!(remaining.len(), 1);

    manager
        .complete_task(&plan.plan_id, &remaining[0].id, TaskResult::success(None))
        .await
        .unwrap();

    // Completing the last task completes the plan.
    let finished = manager.plan(&plan.plan_id).await.unwrap();
    assert_eq!(finished.status, PlanStatus::Completed);

    let summary = manager.summary(&plan.plan_id).await.unwrap();
    assert_eq!(summary.total_tasks, 2);
    assert_eq!(summary.completed_tasks, 2);
    assert_eq!(summary.progress_percent, 100);
}

#[tokio::test]
async fn delete_plan_removes_store_entry_and_snapshot() {
    let (_temp_dir, manager) = create_test_manager().await;

    let plan = manager.create_plan("short lived", None).await;
    manager
        .add_task(&plan.plan_id, &CreateTask::new("only task"))
        .await
        .unwrap();
    manager.save_plan(&plan.plan_id).await.unwrap();
    assert_eq!(
        manager.list_persisted_plans().await.unwrap(),
        vec![plan.plan_id.clone()]
    );

    assert!(manager.delete_plan(&plan.plan_id).await.unwrap());
    assert!(!manager.has_plan(&plan.plan_id).await);
    assert!(manager.list_persisted_plans().await.unwrap().is_empty());

    // Deleting again reports nothing to delete.
    assert!(!manager.delete_plan(&plan.plan_id).await.unwrap());
}

#[tokio::test]
async fn failure_blocks_downstream_tasks() {
    let (_temp_dir, manager) = create_test_manager().await;

    let plan = manager.create_plan("fragile chain", None).await;
    let a = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("fetch").with_max_retries(0),
        )
        .await
        .unwrap();
    let b = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("parse").with_dependencies(vec![a.id.clone()]),
        )
        .await
        .unwrap();
    let c = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("report").with_dependencies(vec![b.id.clone()]),
        )
        .await
        .unwrap();

    let failed = manager
        .fail_task(&plan.plan_id, &a.id, "network down")
        .await
        .unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);

    let downstream = manager.blocked_by_failure(&plan.plan_id, &a.id).await;
    assert!(downstream.contains(&b.id));
    assert!(downstream.contains(&c.id));

    let order = manager.execution_order(&plan.plan_id).await.unwrap();
    assert!(order.blocked.contains(&b.id));
    assert!(order.ready.is_empty());
}

#[tokio::test]
async fn evidence_flows_into_replan_inputs() {
    let (_temp_dir, manager) = create_test_manager().await;

    let plan = manager.create_plan("research", None).await;
    let task = manager
        .add_task(&plan.plan_id, &CreateTask::new("investigate"))
        .await
        .unwrap();

    manager
        .add_evidence(
            &plan.plan_id,
            &task.id,
            compass_core::EvidenceKind::Discovery,
            "api rate limit is lower than assumed",
            9,
        )
        .await
        .unwrap();
    manager
        .add_evidence(
            &plan.plan_id,
            &task.id,
            compass_core::EvidenceKind::Context,
            "docs link",
            2,
        )
        .await
        .unwrap();

    let significant = manager.unprocessed_evidence(&plan.plan_id, Some(5)).await;
    assert_eq!(significant.len(), 1);

    let before = manager.plan(&plan.plan_id).await.unwrap();
    manager.start_replanning(&plan.plan_id).await.unwrap();
    let after = manager.plan(&plan.plan_id).await.unwrap();
    assert_eq!(after.version, before.version + 1);

    let ids: Vec<String> = significant.iter().map(|e| e.id.clone()).collect();
    manager.mark_evidence_processed(&plan.plan_id, &ids).await;
    assert!(manager
        .unprocessed_evidence(&plan.plan_id, Some(5))
        .await
        .is_empty());
}
