use std::collections::VecDeque;
use std::time::Duration;

use courier_remote::RemoteError;
use courier_tasks_domain::{ResultPayload, StatusPayload};

/// A failure the scripted backend should produce. Cloneable so one script
/// entry can be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedError {
    Connection(String),
    Status(u16, String),
    Validation(String),
}

impl From<ScriptedError> for RemoteError {
    fn from(e: ScriptedError) -> Self {
        match e {
            ScriptedError::Connection(msg) => RemoteError::Connection(msg),
            ScriptedError::Status(status, message) => RemoteError::Status { status, message },
            ScriptedError::Validation(msg) => RemoteError::Validation(msg),
        }
    }
}

pub(crate) type Scripted<T> = Result<T, ScriptedError>;

/// Replies for one task, consumed in order. The last entry of each queue
/// repeats once everything before it has been served.
#[derive(Debug, Clone, Default)]
pub struct TaskScript {
    pub(crate) statuses: VecDeque<Scripted<StatusPayload>>,
    pub(crate) results: VecDeque<Scripted<ResultPayload>>,
    pub(crate) status_latency: Option<Duration>,
}

impl TaskScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(mut self, status: StatusPayload) -> Self {
        self.statuses.push_back(Ok(status));
        self
    }

    #[must_use]
    pub fn status_error(mut self, error: ScriptedError) -> Self {
        self.statuses.push_back(Err(error));
        self
    }

    #[must_use]
    pub fn result(mut self, result: ResultPayload) -> Self {
        self.results.push_back(Ok(result));
        self
    }

    #[must_use]
    pub fn result_error(mut self, error: ScriptedError) -> Self {
        self.results.push_back(Err(error));
        self
    }

    /// Delay every status reply of this task, overriding the backend default.
    #[must_use]
    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = Some(latency);
        self
    }
}

/// Pop the next reply, keeping the last one sticky. `None` when the queue
/// was never scripted.
pub(crate) fn next_reply<T: Clone>(queue: &mut VecDeque<Scripted<T>>) -> Option<Scripted<T>> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}
