//! Lifecycle of one remote task: start, poll until terminal, merge the
//! result, and stop observing on demand.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;

use courier_remote::{RemoteError, TaskApi};
use courier_tasks_domain::{
    MergedResult, ResultPayload, StartTaskRequest, StatusPayload, Task, TaskId, TaskState,
    reconcile,
};

use crate::config::PollConfig;
use crate::error::TrackerError;
use crate::session::{PollingSession, TickFlow, TickHandler};

const DEFAULT_FAILURE_REASON: &str = "task failed";

/// Terminal resolution of a task as presented to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(MergedResult),
    Failed { reason: String },
}

/// Snapshot of everything the controller knows. Published through a
/// `watch` channel so callers can render it reactively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskView {
    /// Bumped by every start and cancel. A tick carrying an older
    /// generation is stale and is discarded.
    pub generation: u64,
    pub task: Option<Task>,
    pub outcome: Option<TaskOutcome>,
    /// True while a polling session is attached to `task`.
    pub observing: bool,
}

/// Drives one remote task from submission to terminal state.
///
/// Dropping the controller stops polling; the remote job itself is never
/// cancelled by this type.
pub struct TaskLifecycleController {
    remote: Arc<dyn TaskApi>,
    config: PollConfig,
    session: PollingSession,
    view: Arc<watch::Sender<TaskView>>,
}

impl TaskLifecycleController {
    pub fn new(remote: Arc<dyn TaskApi>, config: PollConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let (view, _) = watch::channel(TaskView::default());
        Ok(Self {
            remote,
            config,
            session: PollingSession::new(),
            view: Arc::new(view),
        })
    }

    /// Start a new remote task and begin polling it.
    ///
    /// Any session still attached to a previous task is disarmed before the
    /// start request is sent. On error nothing is created or armed.
    pub async fn start(&mut self, request: &StartTaskRequest) -> Result<TaskId, TrackerError> {
        if self.stop_observing() {
            tracing::info!("superseding previous task");
        }

        let task_id = self.remote.start_task(request).await.inspect_err(|e| {
            tracing::warn!(error = %e, "start request rejected");
        })?;

        let mut generation = 0;
        self.view.send_modify(|view| {
            view.generation += 1;
            generation = view.generation;
            view.task = Some(Task::pending(task_id.clone()));
            view.outcome = None;
            view.observing = true;
        });

        let poller = StatusPoller {
            remote: self.remote.clone(),
            view: self.view.clone(),
            generation,
            config: self.config.clone(),
            attempts: AtomicU32::new(0),
            consecutive_errors: AtomicU32::new(0),
        };
        self.session
            .arm(task_id.clone(), self.config.interval(), Box::new(poller));

        tracing::info!(task_id = %task_id, generation, "task started");
        Ok(task_id)
    }

    /// Stop observing the current task. The remote job keeps running.
    /// Idempotent.
    pub fn cancel(&mut self) {
        if self.stop_observing() {
            tracing::info!("stopped observing task");
        }
    }

    pub fn snapshot(&self) -> TaskView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskView> {
        self.view.subscribe()
    }

    pub fn is_observing(&self) -> bool {
        self.session.is_armed()
    }

    /// Number of sessions armed over this controller's lifetime.
    pub fn sessions_armed(&self) -> u64 {
        self.session.arm_count()
    }

    /// Wait until the current task resolves. Returns `None` once nothing
    /// is being observed without an outcome (cancelled, or never started).
    pub async fn wait_for_outcome(&self) -> Option<TaskOutcome> {
        let mut rx = self.view.subscribe();
        let view = rx
            .wait_for(|v| v.outcome.is_some() || !v.observing)
            .await
            .ok()?;
        view.outcome.clone()
    }

    fn stop_observing(&mut self) -> bool {
        let disarmed = self.session.disarm();
        let detached = self.view.send_if_modified(|view| {
            if !view.observing {
                return false;
            }
            view.generation += 1;
            view.observing = false;
            true
        });
        disarmed || detached
    }
}

/// Per-session tick handler: one status fetch per tick, plus the result
/// fetch once the status is completed.
struct StatusPoller {
    remote: Arc<dyn TaskApi>,
    view: Arc<watch::Sender<TaskView>>,
    generation: u64,
    config: PollConfig,
    attempts: AtomicU32,
    consecutive_errors: AtomicU32,
}

#[async_trait]
impl TickHandler for StatusPoller {
    async fn on_tick(&self, task_id: &TaskId) -> TickFlow {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(task_id = %task_id, attempt, "polling task status");

        let status = match self.remote.get_task_status(task_id).await {
            Ok(status) => status,
            Err(e) => return self.on_fetch_error(task_id, attempt, "status", &e),
        };

        // The result fetch is only valid once the status says completed.
        let result = if status.state == TaskState::Completed {
            match self.remote.get_task_result(task_id).await {
                Ok(result) => Some(result),
                Err(e) => return self.on_fetch_error(task_id, attempt, "result", &e),
            }
        } else {
            None
        };

        self.consecutive_errors.store(0, Ordering::Relaxed);
        self.apply(task_id, attempt, &status, result.as_ref())
    }
}

impl StatusPoller {
    fn attempts_exhausted(&self, attempt: u32) -> bool {
        self.config.max_attempts.is_some_and(|max| attempt >= max)
    }

    fn apply(
        &self,
        task_id: &TaskId,
        attempt: u32,
        status: &StatusPayload,
        result: Option<&ResultPayload>,
    ) -> TickFlow {
        let exhausted = self.attempts_exhausted(attempt);
        let mut stale = true;
        let mut resolved = None;

        self.view.send_if_modified(|view| {
            if view.generation != self.generation || !view.observing {
                return false;
            }
            let Some(previous) = view.task.as_ref() else {
                return false;
            };
            stale = false;

            let mut next = reconcile(previous, status, result);
            let mut outcome = match (&next.state, &next.result) {
                (TaskState::Completed, Some(merged)) => {
                    Some(TaskOutcome::Completed(merged.clone()))
                }
                (TaskState::Failed, _) => Some(TaskOutcome::Failed {
                    reason: status
                        .message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string()),
                }),
                _ => None,
            };
            if outcome.is_none() && exhausted {
                let reason = format!("no terminal status after {attempt} polls");
                next = next.failed_locally(reason.clone());
                outcome = Some(TaskOutcome::Failed { reason });
            }

            let changed = *previous != next || outcome.is_some();
            if let Some(outcome) = outcome {
                view.observing = false;
                view.outcome = Some(outcome.clone());
                resolved = Some(outcome);
            }
            view.task = Some(next);
            changed
        });

        if stale {
            tracing::debug!(task_id = %task_id, attempt, "discarding stale poll result");
            return TickFlow::Halt;
        }

        match resolved {
            Some(TaskOutcome::Completed(merged)) => {
                tracing::info!(
                    task_id = %task_id,
                    attempt,
                    artifacts = merged.result.artifacts.len(),
                    errors = merged.errors.len(),
                    "task completed"
                );
                TickFlow::Halt
            }
            Some(TaskOutcome::Failed { reason }) => {
                tracing::warn!(task_id = %task_id, attempt, reason = %reason, "task failed");
                TickFlow::Halt
            }
            None => TickFlow::Continue,
        }
    }

    fn on_fetch_error(
        &self,
        task_id: &TaskId,
        attempt: u32,
        fetch: &'static str,
        error: &RemoteError,
    ) -> TickFlow {
        let errors = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(
            task_id = %task_id,
            attempt,
            fetch,
            consecutive_errors = errors,
            transient = error.is_transient(),
            error = %error,
            "poll failed, retrying on next tick"
        );

        let reason = if self
            .config
            .max_consecutive_errors
            .is_some_and(|max| errors >= max)
        {
            format!("gave up after {errors} consecutive poll errors: {error}")
        } else if self.attempts_exhausted(attempt) {
            format!("no terminal status after {attempt} polls")
        } else {
            return TickFlow::Continue;
        };

        self.fail_locally(task_id, reason)
    }

    fn fail_locally(&self, task_id: &TaskId, reason: String) -> TickFlow {
        let applied = self.view.send_if_modified(|view| {
            if view.generation != self.generation || !view.observing {
                return false;
            }
            let Some(task) = view.task.take() else {
                return false;
            };
            view.task = Some(task.failed_locally(reason.clone()));
            view.outcome = Some(TaskOutcome::Failed {
                reason: reason.clone(),
            });
            view.observing = false;
            true
        });

        if applied {
            tracing::warn!(task_id = %task_id, reason = %reason, "task failed locally");
        }
        TickFlow::Halt
    }
}
