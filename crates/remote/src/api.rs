use async_trait::async_trait;

use courier_tasks_domain::{
    ItemPayload, ResultPayload, StartTaskRequest, StatusPayload, SubmitOptions, SubmitResponse,
    TaskId,
};

use crate::error::RemoteError;

/// Remote operations for a single long-running task. Created once, shared
/// across the application.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Start a new task. Fails with [`RemoteError::Validation`] when required
    /// configuration is missing.
    async fn start_task(&self, request: &StartTaskRequest) -> Result<TaskId, RemoteError>;

    async fn get_task_status(&self, task_id: &TaskId) -> Result<StatusPayload, RemoteError>;

    /// Durable result artifact. Only valid once the status is completed.
    async fn get_task_result(&self, task_id: &TaskId) -> Result<ResultPayload, RemoteError>;
}

/// Remote single-item endpoint. Single shot: the server reports nothing
/// until the whole item has been processed.
#[async_trait]
pub trait QueueApi: Send + Sync {
    async fn submit_item(
        &self,
        payload: &ItemPayload,
        options: &SubmitOptions,
    ) -> Result<SubmitResponse, RemoteError>;
}
