use std::collections::BTreeMap;

use crate::ids::TaskId;
use crate::payloads::{ResultPayload, SummaryMetric};
use crate::state::TaskState;

/// Client-side view of one remote task.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub state: TaskState,
    /// Index into the sparse stage catalog.
    pub stage: u32,
    /// Display only. Never lowered by a later poll.
    pub iteration: u64,
    /// Replaced wholesale by each poll that carries counters.
    pub counters: BTreeMap<String, u64>,
    /// `None` until the remote has reported an error list.
    pub terminal_errors: Option<Vec<String>>,
    pub summary_metric: Option<SummaryMetric>,
    pub message: Option<String>,
    /// Merged result view, set once the task has completed.
    pub result: Option<MergedResult>,
}

impl Task {
    /// A freshly created task, before its first poll.
    #[must_use]
    pub fn pending(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Pending,
            stage: 0,
            iteration: 0,
            counters: BTreeMap::new(),
            terminal_errors: None,
            summary_metric: None,
            message: None,
            result: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Marks a non-terminal task failed on the client side (poll budget
    /// exhausted). Terminal tasks are returned unchanged.
    #[must_use]
    pub fn failed_locally(mut self, reason: impl Into<String>) -> Self {
        if self.state.is_terminal() {
            return self;
        }
        self.state = TaskState::Failed;
        self.message = Some(reason.into());
        self
    }
}

/// The result artifact combined with the transient fields from the last
/// status poll. Serializes flat: result fields plus `errors` and
/// `summary_metric`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MergedResult {
    #[serde(flatten)]
    pub result: ResultPayload,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_metric: Option<SummaryMetric>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_task_has_no_known_fields() {
        let task = Task::pending(TaskId::new("t-1").unwrap());
        assert_eq!(task.state, TaskState::Pending);
        assert!(task.terminal_errors.is_none());
        assert!(task.result.is_none());
        assert!(!task.is_terminal());
    }

    #[test]
    fn failed_locally_sets_reason() {
        let task = Task::pending(TaskId::new("t-1").unwrap()).failed_locally("gave up");
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.message.as_deref(), Some("gave up"));
    }

    #[test]
    fn failed_locally_keeps_terminal_task() {
        let mut task = Task::pending(TaskId::new("t-1").unwrap());
        task.state = TaskState::Completed;
        let task = task.failed_locally("late");
        assert_eq!(task.state, TaskState::Completed);
        assert!(task.message.is_none());
    }

    #[test]
    fn merged_result_serializes_flat() {
        let merged = MergedResult {
            result: ResultPayload {
                artifacts: vec![json!("c1")],
                ..Default::default()
            },
            errors: vec!["warn1".to_string()],
            summary_metric: None,
        };
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value, json!({"artifacts": ["c1"], "errors": ["warn1"]}));
    }
}
