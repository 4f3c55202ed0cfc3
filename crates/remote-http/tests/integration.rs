//! Integration tests for the HTTP remote backend.
//!
//! Tests that talk to a real backend require COURIER_REMOTE_URL to be set
//! (e.g. `http://localhost:8080/api`); they return early otherwise.
//!
//! Run with: COURIER_REMOTE_URL=http://localhost:8080/api cargo test --package courier-remote-http

use serde_json::json;
use std::time::Duration;

use courier_remote::{QueueApi, RemoteError, TaskApi};
use courier_remote_http::{HttpRemote, HttpRemoteConfig};
use courier_tasks_domain::{ItemPayload, StartTaskRequest, SubmitOptions, TaskId, TaskState};

fn remote_url() -> Option<String> {
    std::env::var("COURIER_REMOTE_URL").ok()
}

fn connect() -> HttpRemote {
    let base_url = remote_url().expect("COURIER_REMOTE_URL must be set for integration tests");
    HttpRemote::new(HttpRemoteConfig {
        base_url,
        timeout_ms: 30_000,
    })
    .expect("failed to build HTTP client")
}

/// Unique, never-issued task id per test.
fn unknown_task_id() -> TaskId {
    TaskId::new(&format!("missing-{}", std::process::id())).unwrap()
}

#[tokio::test]
async fn test_unreachable_backend_is_connection_error() {
    // Port 9 (discard) is closed on test hosts.
    let remote = HttpRemote::new(HttpRemoteConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_ms: 2_000,
    })
    .unwrap();

    let err = remote
        .get_task_status(&unknown_task_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Connection(_)), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unknown_task_status_is_rejected() {
    if remote_url().is_none() {
        return;
    }
    let remote = connect();
    let err = remote
        .get_task_status(&unknown_task_id())
        .await
        .unwrap_err();
    assert!(
        matches!(err, RemoteError::Status { status: 404, .. } | RemoteError::Validation(_)),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_start_without_config_is_validation_error() {
    if remote_url().is_none() {
        return;
    }
    let remote = connect();
    let err = remote
        .start_task(&StartTaskRequest::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Validation(_)), "{err:?}");
}

#[tokio::test]
async fn test_start_and_poll_status() {
    if remote_url().is_none() {
        return;
    }
    let remote = connect();
    let request = StartTaskRequest::new()
        .with("concepts", json!(["integration"]))
        .with("documents", json!(["courier integration test"]))
        .with("maxIterations", 1);

    let task_id = remote.start_task(&request).await.unwrap();
    let status = tokio::time::timeout(Duration::from_secs(10), remote.get_task_status(&task_id))
        .await
        .expect("status request timed out")
        .expect("status must decode");
    if status.state == TaskState::Completed {
        remote.get_task_result(&task_id).await.expect("result must decode");
    }
}

#[tokio::test]
async fn test_submit_item_roundtrip() {
    if remote_url().is_none() {
        return;
    }
    let remote = connect();
    let payload = ItemPayload::new("courier-integration.txt", b"hello from courier".to_vec())
        .with_media_type("text/plain");

    let response = remote
        .submit_item(&payload, &SubmitOptions::default())
        .await
        .unwrap();
    assert!(response.into_outcome().is_ok());
}
