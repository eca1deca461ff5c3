//! Integration tests for snapshot persistence, restore, and auto-save.

mod common;

use std::time::Duration;

use compass_core::params::CreateTask;
use compass_core::{
    DecisionActor, DecisionKind, EvidenceKind, PlanStatus, ProgressManagerBuilder, TaskResult,
    TaskStatus,
};
use common::{create_test_manager, create_test_manager_with_delay};

#[tokio::test]
async fn round_trip_preserves_state_and_relationships() {
    let (temp_dir, manager) = create_test_manager().await;

    let plan = manager.create_plan("restorable", None).await;
    let a = manager
        .add_task(&plan.plan_id, &CreateTask::new("first"))
        .await
        .unwrap();
    let b = manager
        .add_task(
            &plan.plan_id,
            &CreateTask::new("second").with_dependencies(vec![a.id.clone()]),
        )
        .await
        .unwrap();

    manager
        .complete_task(&plan.plan_id, &a.id, TaskResult::success(None))
        .await
        .unwrap();
    manager
        .add_evidence(
            &plan.plan_id,
            &a.id,
            EvidenceKind::Discovery,
            "useful finding",
            7,
        )
        .await
        .unwrap();
    manager
        .log_decision(
            &plan.plan_id,
            DecisionKind::Assign,
            "assigned second",
            "first finished",
            DecisionActor::Factory,
            vec![b.id.clone()],
        )
        .await
        .unwrap();

    manager.save_plan(&plan.plan_id).await.unwrap();
    let original = manager.plan(&plan.plan_id).await.unwrap();

    // A fresh process over the same directory.
    let manager2 = ProgressManagerBuilder::new()
        .with_persistence_root(temp_dir.path())
        .build()
        .await
        .unwrap();

    let restored = manager2
        .restore_plan(&plan.plan_id)
        .await
        .unwrap()
        .expect("snapshot should restore");

    // Ids are regenerated but counts, statuses, and relationships survive.
    assert_ne!(restored.plan_id, original.plan_id);
    assert_eq!(restored.goal, original.goal);
    assert_eq!(restored.status, original.status);
    assert_eq!(restored.tasks.len(), 2);
    assert_eq!(restored.evidence.len(), 1);
    assert_eq!(restored.decisions.len(), original.decisions.len());

    let new_a = &restored.tasks[0];
    let new_b = &restored.tasks[1];
    assert_eq!(new_a.status, TaskStatus::Completed);
    assert!(new_a.result.as_ref().is_some_and(|r| r.success));
    assert_eq!(new_b.status, TaskStatus::Pending);
    assert_eq!(new_b.dependencies, vec![new_a.id.clone()]);
    assert_eq!(restored.evidence[0].task_id, new_a.id);

    let related = &restored
        .decisions
        .iter()
        .find(|d| d.kind == DecisionKind::Assign && d.decision == "assigned second")
        .unwrap()
        .related_task_ids;
    assert_eq!(related, &vec![new_b.id.clone()]);
}

#[tokio::test]
async fn unparseable_snapshot_is_ignored() {
    let (temp_dir, manager) = create_test_manager().await;

    let dir = temp_dir.path().join(".compass/progress");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("broken.json"), b"{ not json").unwrap();

    let restored = manager.restore_plan("broken").await.unwrap();
    assert!(restored.is_none());
}

#[tokio::test]
async fn snapshot_missing_required_fields_is_ignored() {
    let (temp_dir, manager) = create_test_manager().await;

    let dir = temp_dir.path().join(".compass/progress");
    std::fs::create_dir_all(&dir).unwrap();
    // Parses, but the goal is empty.
    std::fs::write(
        dir.join("hollow.json"),
        serde_json::json!({
            "planId": "hollow",
            "goal": "",
            "version": 1,
            "status": "planning",
            "tasks": [],
            "evidence": [],
            "decisions": [],
            "createdAt": 1_700_000_000_000_i64,
            "updatedAt": 1_700_000_000_000_i64
        })
        .to_string(),
    )
    .unwrap();

    let restored = manager.restore_plan("hollow").await.unwrap();
    assert!(restored.is_none());
}

#[tokio::test]
async fn auto_save_coalesces_into_one_debounced_write() {
    let (temp_dir, manager) = create_test_manager_with_delay(100).await;

    let plan = manager.create_plan("busy", None).await;
    let task = manager
        .add_task(&plan.plan_id, &CreateTask::new("churn"))
        .await
        .unwrap();
    manager
        .start_task(&plan.plan_id, &task.id, Some("worker"))
        .await
        .unwrap();
    manager
        .complete_task(&plan.plan_id, &task.id, TaskResult::success(None))
        .await
        .unwrap();

    let path = temp_dir
        .path()
        .join(".compass/progress")
        .join(format!("{}.json", plan.plan_id));

    // Inside the debounce window nothing has been written yet.
    assert!(!path.exists());

    tokio::time::sleep(Duration::from_millis(400)).await;

    // After the window, one snapshot exists and carries the final state.
    let content = std::fs::read_to_string(&path).expect("snapshot should exist");
    let written: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(written["status"], "completed");
    assert_eq!(written["tasks"][0]["status"], "completed");
}

#[tokio::test]
async fn flush_writes_pending_saves_immediately() {
    // Long window so the timer cannot fire on its own.
    let (temp_dir, manager) = create_test_manager_with_delay(60_000).await;

    let plan = manager.create_plan("shutdown", None).await;
    manager
        .add_task(&plan.plan_id, &CreateTask::new("unsaved work"))
        .await
        .unwrap();

    // Give the auto-save forwarder a moment to schedule the debounced save.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let path = temp_dir
        .path()
        .join(".compass/progress")
        .join(format!("{}.json", plan.plan_id));
    assert!(!path.exists());

    manager.flush().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn zero_delay_auto_save_writes_without_flush() {
    let (temp_dir, manager) = create_test_manager_with_delay(0).await;

    let plan = manager.create_plan("instant", None).await;
    manager
        .add_task(&plan.plan_id, &CreateTask::new("write me now"))
        .await
        .unwrap();

    // The forwarder and the zero-length timer both settle well within this.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let path = temp_dir
        .path()
        .join(".compass/progress")
        .join(format!("{}.json", plan.plan_id));
    assert!(path.exists());
}

#[tokio::test]
async fn flush_failure_keeps_every_pending_save_for_retry() {
    // Long window so the timer cannot fire on its own.
    let (temp_dir, manager) = create_test_manager_with_delay(60_000).await;

    let first = manager.create_plan("first", None).await;
    manager
        .add_task(&first.plan_id, &CreateTask::new("one"))
        .await
        .unwrap();
    let second = manager.create_plan("second", None).await;
    manager
        .add_task(&second.plan_id, &CreateTask::new("two"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    // A file squatting on the snapshot directory path makes every save fail.
    let blocker = temp_dir.path().join(".compass");
    std::fs::write(&blocker, b"in the way").unwrap();
    assert!(manager.flush().await.is_err());

    // Once the obstruction is gone, a retried flush writes both plans.
    std::fs::remove_file(&blocker).unwrap();
    manager.flush().await.unwrap();

    let persisted = manager.list_persisted_plans().await.unwrap();
    let mut expected = vec![first.plan_id.clone(), second.plan_id.clone()];
    expected.sort();
    assert_eq!(persisted, expected);
}

#[tokio::test]
async fn restore_resolves_dependencies_declared_out_of_order() {
    let (temp_dir, manager) = create_test_manager().await;

    let dir = temp_dir.path().join(".compass/progress");
    std::fs::create_dir_all(&dir).unwrap();
    // A hand-edited snapshot may list a task before its dependency.
    std::fs::write(
        dir.join("edited.json"),
        serde_json::json!({
            "planId": "edited",
            "goal": "hand edited",
            "version": 1,
            "status": "planning",
            "tasks": [
                {
                    "id": "dependent",
                    "description": "waits on the later one",
                    "status": "blocked",
                    "dependencies": ["declared-later"],
                    "retryCount": 0,
                    "maxRetries": 3,
                    "priority": 0,
                    "createdAt": 1_700_000_000_000_i64
                },
                {
                    "id": "declared-later",
                    "description": "listed second",
                    "status": "pending",
                    "dependencies": [],
                    "retryCount": 0,
                    "maxRetries": 3,
                    "priority": 0,
                    "createdAt": 1_700_000_000_000_i64
                }
            ],
            "evidence": [],
            "decisions": [],
            "createdAt": 1_700_000_000_000_i64,
            "updatedAt": 1_700_000_000_000_i64
        })
        .to_string(),
    )
    .unwrap();

    let restored = manager.restore_plan("edited").await.unwrap().unwrap();
    let dependent = &restored.tasks[0];
    let target = &restored.tasks[1];
    assert_eq!(dependent.dependencies, vec![target.id.clone()]);
    assert_eq!(dependent.status, TaskStatus::Blocked);
}

#[tokio::test]
async fn cleanup_removes_terminal_plans_and_keeps_active_ones() {
    let (_temp_dir, manager) = create_test_manager().await;

    let active = manager.create_plan("still going", None).await;
    manager
        .add_task(&active.plan_id, &CreateTask::new("in flight"))
        .await
        .unwrap();
    manager.save_plan(&active.plan_id).await.unwrap();

    let done = manager.create_plan("wrapped up", None).await;
    let task = manager
        .add_task(&done.plan_id, &CreateTask::new("everything"))
        .await
        .unwrap();
    manager
        .complete_task(&done.plan_id, &task.id, TaskResult::success(None))
        .await
        .unwrap();
    assert_eq!(
        manager.plan(&done.plan_id).await.unwrap().status,
        PlanStatus::Completed
    );
    manager.save_plan(&done.plan_id).await.unwrap();

    let removed = manager.cleanup_old_plans(None).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = manager.list_persisted_plans().await.unwrap();
    assert_eq!(remaining, vec![active.plan_id.clone()]);
}
