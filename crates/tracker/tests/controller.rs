use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use courier_remote::RemoteError;
use courier_remote_memory::{MemoryRemote, MemoryRemoteConfig, ScriptedError, TaskScript};
use courier_tasks_domain::{
    ResultPayload, StartTaskRequest, StatusPayload, SummaryMetric, TaskId, TaskState,
};
use courier_tracker::{PollConfig, TaskLifecycleController, TaskOutcome, TaskView, TrackerError};

fn create_remote() -> Arc<MemoryRemote> {
    Arc::new(MemoryRemote::new(MemoryRemoteConfig {
        required_keys: vec!["concepts".to_string()],
        ..Default::default()
    }))
}

fn fast_polling() -> PollConfig {
    PollConfig {
        interval_ms: 10,
        ..Default::default()
    }
}

fn request() -> StartTaskRequest {
    StartTaskRequest::new()
        .with("concepts", json!(["a"]))
        .with("maxIterations", 5)
}

fn running(stage: u32, iteration: u64) -> StatusPayload {
    StatusPayload::new(TaskState::Running, stage, iteration)
}

async fn outcome(controller: &TaskLifecycleController) -> Option<TaskOutcome> {
    tokio::time::timeout(Duration::from_secs(2), controller.wait_for_outcome())
        .await
        .expect("timed out waiting for outcome")
}

async fn wait_for_status_calls(remote: &MemoryRemote, task_id: &TaskId, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while remote.status_calls(task_id).await < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("timed out waiting for status polls");
}

async fn wait_for_state(controller: &TaskLifecycleController, state: TaskState) {
    let mut rx = controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(2),
        rx.wait_for(|v| v.task.as_ref().is_some_and(|t| t.state == state)),
    )
    .await
    .expect("timed out waiting for state")
    .expect("view sender dropped");
}

// --- Completion ---

#[tokio::test]
async fn test_completed_task_merges_last_status_fields() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(running(0, 1))
                .status(running(1, 2))
                .status(running(2, 3))
                .status(
                    StatusPayload::new(TaskState::Completed, 2, 4)
                        .with_errors(vec!["warn1".to_string()])
                        .with_summary_metric(SummaryMetric {
                            ratio: 0.8,
                            matched: 4,
                            total: 5,
                        }),
                )
                .result(ResultPayload {
                    artifacts: vec![json!("c1"), json!("c2")],
                    ..Default::default()
                }),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let task_id = controller.start(&request()).await.unwrap();

    let Some(TaskOutcome::Completed(merged)) = outcome(&controller).await else {
        panic!("expected completion");
    };
    assert_eq!(
        serde_json::to_value(&merged).unwrap(),
        json!({
            "artifacts": ["c1", "c2"],
            "errors": ["warn1"],
            "summary_metric": {"ratio": 0.8, "matched": 4, "total": 5},
        })
    );

    let view = controller.snapshot();
    let task = view.task.unwrap();
    assert_eq!(task.id, task_id);
    assert_eq!(task.state, TaskState::Completed);
    assert_eq!(task.iteration, 4);
    assert_eq!(task.result, Some(merged));
    assert!(!view.observing);

    assert_eq!(remote.status_calls(&task_id).await, 4);
    assert_eq!(remote.result_calls(&task_id).await, 1);
}

#[tokio::test]
async fn test_earlier_status_fields_survive_into_merge() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(running(1, 1).with_errors(vec!["early".to_string()]))
                .status(StatusPayload::new(TaskState::Completed, 2, 2))
                .result(ResultPayload {
                    artifacts: vec![json!("c1")],
                    ..Default::default()
                }),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote, fast_polling()).unwrap();
    controller.start(&request()).await.unwrap();

    let Some(TaskOutcome::Completed(merged)) = outcome(&controller).await else {
        panic!("expected completion");
    };
    assert_eq!(merged.errors, vec!["early".to_string()]);
    assert!(merged.summary_metric.is_none());
}

// --- Failure ---

#[tokio::test]
async fn test_failed_task_never_fetches_result() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(running(1, 1))
                .status(StatusPayload::new(TaskState::Failed, 1, 1).with_message("out of quota")),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let task_id = controller.start(&request()).await.unwrap();

    assert_eq!(
        outcome(&controller).await,
        Some(TaskOutcome::Failed {
            reason: "out of quota".to_string()
        })
    );
    assert_eq!(remote.result_calls(&task_id).await, 0);
    assert_eq!(
        controller.snapshot().task.unwrap().state,
        TaskState::Failed
    );
}

#[tokio::test]
async fn test_transient_poll_errors_are_ignored() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status_error(ScriptedError::Connection("reset".to_string()))
                .status(running(1, 1))
                .status_error(ScriptedError::Status(502, "bad gateway".to_string()))
                .status(StatusPayload::new(TaskState::Completed, 2, 2)),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote, fast_polling()).unwrap();
    controller.start(&request()).await.unwrap();

    assert!(matches!(
        outcome(&controller).await,
        Some(TaskOutcome::Completed(_))
    ));
}

#[tokio::test]
async fn test_failed_result_fetch_is_retried_next_tick() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(StatusPayload::new(TaskState::Completed, 2, 2))
                .result_error(ScriptedError::Connection("reset".to_string()))
                .result(ResultPayload {
                    narrative: Some("done".to_string()),
                    ..Default::default()
                }),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let task_id = controller.start(&request()).await.unwrap();

    let Some(TaskOutcome::Completed(merged)) = outcome(&controller).await else {
        panic!("expected completion");
    };
    assert_eq!(merged.result.narrative.as_deref(), Some("done"));
    assert_eq!(remote.status_calls(&task_id).await, 2);
    assert_eq!(remote.result_calls(&task_id).await, 2);
}

#[tokio::test]
async fn test_consecutive_error_limit_fails_locally() {
    let remote = create_remote();
    remote
        .push_task(TaskScript::new().status_error(ScriptedError::Connection("down".to_string())))
        .await;

    let config = PollConfig {
        max_consecutive_errors: Some(3),
        ..fast_polling()
    };
    let mut controller = TaskLifecycleController::new(remote.clone(), config).unwrap();
    let task_id = controller.start(&request()).await.unwrap();

    let Some(TaskOutcome::Failed { reason }) = outcome(&controller).await else {
        panic!("expected failure");
    };
    assert!(reason.starts_with("gave up after 3 consecutive poll errors"));
    assert_eq!(remote.status_calls(&task_id).await, 3);
    assert!(!controller.is_observing());
}

// --- Start ---

#[tokio::test]
async fn test_start_failure_creates_nothing() {
    let remote = create_remote();
    let mut controller = TaskLifecycleController::new(remote, fast_polling()).unwrap();

    let err = controller
        .start(&StartTaskRequest::new().with("maxIterations", 5))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TrackerError::Remote(RemoteError::Validation(_))
    ));
    assert_eq!(controller.snapshot(), TaskView::default());
    assert!(!controller.is_observing());
    assert_eq!(controller.sessions_armed(), 0);
    assert_eq!(controller.wait_for_outcome().await, None);
}

#[tokio::test]
async fn test_second_start_replaces_first_session() {
    let remote = create_remote();
    remote.push_task(TaskScript::new().status(running(1, 1))).await;
    remote.push_task(TaskScript::new().status(running(2, 7))).await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let first = controller.start(&request()).await.unwrap();
    wait_for_status_calls(&remote, &first, 2).await;

    let second = controller.start(&request()).await.unwrap();
    let first_polls = remote.status_calls(&first).await;
    wait_for_status_calls(&remote, &second, 3).await;

    assert_eq!(remote.status_calls(&first).await, first_polls);
    assert_eq!(controller.sessions_armed(), 2);
    assert!(controller.is_observing());

    let task = controller.snapshot().task.unwrap();
    assert_eq!(task.id, second);
    assert_eq!(task.stage, 2);
}

#[tokio::test]
async fn test_failed_restart_still_stops_previous_session() {
    let remote = create_remote();
    remote.push_task(TaskScript::new().status(running(1, 1))).await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let first = controller.start(&request()).await.unwrap();
    wait_for_status_calls(&remote, &first, 1).await;

    remote
        .fail_next_start(ScriptedError::Status(503, "busy".to_string()))
        .await;
    assert!(controller.start(&request()).await.is_err());
    let polls = remote.status_calls(&first).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.status_calls(&first).await, polls);
    assert!(!controller.is_observing());
    assert_eq!(controller.snapshot().task.unwrap().id, first);
}

// --- Cancel ---

#[tokio::test]
async fn test_cancel_freezes_snapshot() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(running(1, 1))
                .status(running(2, 2)),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let task_id = controller.start(&request()).await.unwrap();
    wait_for_state(&controller, TaskState::Running).await;

    controller.cancel();
    let frozen = controller.snapshot();
    let polls = remote.status_calls(&task_id).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(controller.snapshot().task, frozen.task);
    assert_eq!(remote.status_calls(&task_id).await, polls);
    assert!(!frozen.observing);
    assert_eq!(controller.wait_for_outcome().await, None);

    // Idempotent.
    controller.cancel();
    assert_eq!(controller.snapshot().generation, frozen.generation);
}

#[tokio::test]
async fn test_late_poll_after_cancel_is_discarded() {
    let remote = create_remote();
    remote
        .push_task(
            TaskScript::new()
                .status(StatusPayload::new(TaskState::Completed, 2, 2))
                .with_status_latency(Duration::from_millis(100)),
        )
        .await;

    let mut controller = TaskLifecycleController::new(remote.clone(), fast_polling()).unwrap();
    let task_id = controller.start(&request()).await.unwrap();
    wait_for_status_calls(&remote, &task_id, 1).await;

    let before = controller.snapshot();
    controller.cancel();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let after = controller.snapshot();
    assert_eq!(after.task, before.task);
    assert_eq!(after.task.unwrap().state, TaskState::Pending);
    assert!(after.outcome.is_none());
    assert_eq!(remote.result_calls(&task_id).await, 0);
}
