use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

use courier_remote::{QueueApi, RemoteError, TaskApi};
use courier_tasks_domain::{
    ItemPayload, ResultPayload, StartTaskRequest, StatusPayload, SubmitOptions, SubmitResponse,
    TaskId, TaskState,
};

use crate::script::{Scripted, ScriptedError, TaskScript, next_reply};

#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteConfig {
    /// Keys every start request must carry.
    pub required_keys: Vec<String>,
    pub status_latency: Duration,
    pub result_latency: Duration,
    pub submit_latency: Duration,
}

/// One observed call, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start,
    Status(TaskId),
    Result(TaskId),
    SubmitStarted(String),
    SubmitFinished(String),
}

struct RemoteState {
    next_task: u32,
    pending_scripts: VecDeque<TaskScript>,
    start_failures: VecDeque<ScriptedError>,
    tasks: HashMap<TaskId, TaskScript>,
    items: HashMap<String, VecDeque<Scripted<SubmitResponse>>>,
    calls: Vec<Call>,
}

/// Scripted in-memory stand-in for the pipeline backend.
///
/// Each successful start consumes the next pushed [`TaskScript`]. Items
/// without a scripted reply succeed with `{"name": .., "bytes": ..}`.
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    config: MemoryRemoteConfig,
}

impl MemoryRemote {
    #[must_use]
    pub fn new(config: MemoryRemoteConfig) -> Self {
        Self {
            state: Mutex::new(RemoteState {
                next_task: 1,
                pending_scripts: VecDeque::new(),
                start_failures: VecDeque::new(),
                tasks: HashMap::new(),
                items: HashMap::new(),
                calls: Vec::new(),
            }),
            config,
        }
    }

    /// Script the task created by the next successful start.
    pub async fn push_task(&self, script: TaskScript) {
        self.state.lock().await.pending_scripts.push_back(script);
    }

    /// Make the next start call fail.
    pub async fn fail_next_start(&self, error: ScriptedError) {
        self.state.lock().await.start_failures.push_back(error);
    }

    /// Replies for submissions of the item named `name`, consumed in order.
    pub async fn script_item(
        &self,
        name: impl Into<String>,
        replies: Vec<Result<SubmitResponse, ScriptedError>>,
    ) {
        self.state
            .lock()
            .await
            .items
            .insert(name.into(), replies.into_iter().collect());
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn status_calls(&self, task_id: &TaskId) -> usize {
        self.count_calls(|c| matches!(c, Call::Status(id) if id == task_id))
            .await
    }

    pub async fn result_calls(&self, task_id: &TaskId) -> usize {
        self.count_calls(|c| matches!(c, Call::Result(id) if id == task_id))
            .await
    }

    async fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    async fn record(&self, call: Call) {
        self.state.lock().await.calls.push(call);
    }
}

#[async_trait]
impl TaskApi for MemoryRemote {
    async fn start_task(&self, request: &StartTaskRequest) -> Result<TaskId, RemoteError> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::Start);

        if let Some(error) = state.start_failures.pop_front() {
            return Err(error.into());
        }

        let missing = request.missing_keys(&self.config.required_keys);
        if !missing.is_empty() {
            return Err(RemoteError::Validation(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )));
        }

        let task_id = TaskId::new(&format!("task-{}", state.next_task))
            .map_err(|e| RemoteError::Other(e.to_string()))?;
        state.next_task += 1;

        let script = state.pending_scripts.pop_front().unwrap_or_default();
        state.tasks.insert(task_id.clone(), script);
        tracing::debug!(task_id = %task_id, "memory remote started task");
        Ok(task_id)
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<StatusPayload, RemoteError> {
        let (reply, latency) = {
            let mut state = self.state.lock().await;
            state.calls.push(Call::Status(task_id.clone()));
            let Some(script) = state.tasks.get_mut(task_id) else {
                return Err(unknown_task(task_id));
            };
            let latency = script.status_latency.unwrap_or(self.config.status_latency);
            (next_reply(&mut script.statuses), latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match reply {
            Some(reply) => reply.map_err(RemoteError::from),
            None => Ok(StatusPayload::new(TaskState::Pending, 0, 0)),
        }
    }

    async fn get_task_result(&self, task_id: &TaskId) -> Result<ResultPayload, RemoteError> {
        let reply = {
            let mut state = self.state.lock().await;
            state.calls.push(Call::Result(task_id.clone()));
            let Some(script) = state.tasks.get_mut(task_id) else {
                return Err(unknown_task(task_id));
            };
            next_reply(&mut script.results)
        };

        if !self.config.result_latency.is_zero() {
            tokio::time::sleep(self.config.result_latency).await;
        }

        reply
            .unwrap_or_else(|| Ok(ResultPayload::default()))
            .map_err(RemoteError::from)
    }
}

#[async_trait]
impl QueueApi for MemoryRemote {
    async fn submit_item(
        &self,
        payload: &ItemPayload,
        _options: &SubmitOptions,
    ) -> Result<SubmitResponse, RemoteError> {
        let reply = {
            let mut state = self.state.lock().await;
            state.calls.push(Call::SubmitStarted(payload.name.clone()));
            state
                .items
                .get_mut(&payload.name)
                .and_then(|replies| replies.pop_front())
        };

        if !self.config.submit_latency.is_zero() {
            tokio::time::sleep(self.config.submit_latency).await;
        }

        self.record(Call::SubmitFinished(payload.name.clone())).await;

        match reply {
            Some(reply) => reply.map_err(RemoteError::from),
            None => Ok(SubmitResponse::ok(serde_json::json!({
                "name": payload.name,
                "bytes": payload.size(),
            }))),
        }
    }
}

fn unknown_task(task_id: &TaskId) -> RemoteError {
    RemoteError::Status {
        status: 404,
        message: format!("unknown task {task_id}"),
    }
}
