use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ids::TaskId;
use crate::state::TaskState;

// -- Task payloads --
// Request/response bodies of the four remote operations. Field names are
// snake_case on the wire; camelCase aliases are accepted on input.

/// Configuration for a new remote task. Opaque to the tracker; the remote
/// validates it and rejects missing required keys.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StartTaskRequest {
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl StartTaskRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Keys from `required` that are absent or null in this request.
    pub fn missing_keys<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|k| self.config.get(k.as_str()).is_none_or(Value::is_null))
            .map(String::as_str)
            .collect()
    }
}

/// Response to `StartTask`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TaskCreated {
    #[serde(alias = "taskId")]
    pub task_id: TaskId,
}

/// Quality metric the remote may attach to a status before the task completes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SummaryMetric {
    pub ratio: f64,
    pub matched: u64,
    pub total: u64,
}

/// Response to `GetTaskStatus`. Optional fields that are absent mean
/// "not yet known", not "empty".
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatusPayload {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<u32>,
    #[serde(default)]
    pub iteration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counters: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(
        default,
        alias = "summaryMetric",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_metric: Option<SummaryMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusPayload {
    /// Bare status with no optional fields.
    #[must_use]
    pub fn new(state: TaskState, stage: u32, iteration: u64) -> Self {
        Self {
            state,
            stage: Some(stage),
            iteration,
            counters: None,
            errors: None,
            summary_metric: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    #[must_use]
    pub fn with_summary_metric(mut self, metric: SummaryMetric) -> Self {
        self.summary_metric = Some(metric);
        self
    }

    #[must_use]
    pub fn with_counter(mut self, name: impl Into<String>, value: u64) -> Self {
        self.counters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Response to `GetTaskResult`: the durable artifact of a completed task.
/// Fields the tracker does not interpret are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    #[serde(default)]
    pub artifacts: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// -- Queue payloads --

/// Per-submission options forwarded verbatim to the item endpoint.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubmitOptions {
    #[serde(flatten)]
    pub entries: Map<String, Value>,
}

impl SubmitOptions {
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

/// Response to `SubmitQueueItem`. A transport-level success can still carry
/// an application-level failure in `success` or `error`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl SubmitResponse {
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            success: Some(true),
            error: None,
            result: Some(result),
        }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            error: Some(error.into()),
            result: None,
        }
    }

    /// Split into the item's result or its failure reason.
    pub fn into_outcome(self) -> Result<Value, String> {
        let embedded_error = self.error.filter(|e| !e.trim().is_empty());
        match (self.success, embedded_error) {
            (_, Some(error)) => Err(error),
            (Some(false), None) => Err("request reported failure".to_string()),
            _ => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
