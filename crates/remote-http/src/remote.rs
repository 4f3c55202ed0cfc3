use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use courier_remote::{QueueApi, RemoteError, TaskApi};
use courier_tasks_domain::{
    ItemPayload, ResultPayload, StartTaskRequest, StatusPayload, SubmitOptions, SubmitResponse,
    TaskCreated, TaskId,
};

use crate::config::HttpRemoteConfig;
use crate::error::{map_reqwest_err, status_error};
use crate::wire::SubmitItemBody;

/// JSON-over-HTTP client for the pipeline backend.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(config: HttpRemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(map_reqwest_err)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn task_url(&self, task_id: &TaskId, leaf: &str) -> String {
        self.url(&format!("tasks/{task_id}/{leaf}"))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(map_reqwest_err)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_err)?;

        if !status.is_success() {
            return Err(status_error(
                status.as_u16(),
                &String::from_utf8_lossy(&body),
            ));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TaskApi for HttpRemote {
    async fn start_task(&self, request: &StartTaskRequest) -> Result<TaskId, RemoteError> {
        let url = self.url("tasks");
        tracing::debug!(url = %url, "starting remote task");
        let created: TaskCreated = self.send(self.client.post(&url).json(request)).await?;
        Ok(created.task_id)
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<StatusPayload, RemoteError> {
        self.send(self.client.get(self.task_url(task_id, "status")))
            .await
    }

    async fn get_task_result(&self, task_id: &TaskId) -> Result<ResultPayload, RemoteError> {
        tracing::debug!(task_id = %task_id, "fetching task result");
        self.send(self.client.get(self.task_url(task_id, "result")))
            .await
    }
}

#[async_trait]
impl QueueApi for HttpRemote {
    async fn submit_item(
        &self,
        payload: &ItemPayload,
        options: &SubmitOptions,
    ) -> Result<SubmitResponse, RemoteError> {
        let url = self.url("items");
        tracing::debug!(url = %url, name = %payload.name, bytes = payload.size(), "submitting item");
        let body = SubmitItemBody::new(payload, options);
        self.send(self.client.post(&url).json(&body)).await
    }
}
