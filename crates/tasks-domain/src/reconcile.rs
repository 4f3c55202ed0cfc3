//! Pure reconciliation of status and result payloads into a [`Task`].
//!
//! The status poll and the result fetch are two independent sources. The
//! result artifact is durable but does not reliably carry the transient
//! fields (`errors`, `summary_metric`), so those always come from the status
//! side when the status side has reported them.

use serde_json::Value;

use crate::payloads::{ResultPayload, StatusPayload, SummaryMetric};
use crate::state::TaskState;
use crate::task::{MergedResult, Task};

const ERRORS_KEY: &str = "errors";
const METRIC_KEYS: [&str; 2] = ["summary_metric", "summaryMetric"];

/// Transient fields contributed by the status side of a merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusFields<'a> {
    pub errors: Option<&'a [String]>,
    pub summary_metric: Option<SummaryMetric>,
}

impl<'a> From<&'a Task> for StatusFields<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            errors: task.terminal_errors.as_deref(),
            summary_metric: task.summary_metric,
        }
    }
}

/// Apply one status payload (and, for a completed status, its result) to
/// the previous task value.
///
/// - A terminal `previous` is returned unchanged.
/// - The state never moves backwards; a regressing status keeps the old state.
/// - A `Completed` status is only applied together with its result. Without
///   one, every other field is updated but the state stays where it was.
/// - Absent optional fields keep their previous values.
#[must_use]
pub fn reconcile(previous: &Task, status: &StatusPayload, result: Option<&ResultPayload>) -> Task {
    if previous.is_terminal() {
        return previous.clone();
    }

    let mut next = previous.clone();
    if let Some(stage) = status.stage {
        next.stage = stage;
    }
    next.iteration = next.iteration.max(status.iteration);
    if let Some(counters) = &status.counters {
        next.counters = counters.clone();
    }
    if let Some(errors) = &status.errors {
        next.terminal_errors = Some(errors.clone());
    }
    if let Some(metric) = status.summary_metric {
        next.summary_metric = Some(metric);
    }
    if let Some(message) = &status.message {
        next.message = Some(message.clone());
    }

    let advances = previous.state.can_transition_to(status.state);
    match (status.state, result) {
        (TaskState::Completed, Some(result)) if advances => {
            next.result = Some(merge_result(StatusFields::from(&next), result));
            next.state = TaskState::Completed;
        }
        (TaskState::Completed, None) => {}
        (state, _) if advances => next.state = state,
        _ => {}
    }

    next
}

/// Combine a result artifact with status-side transient fields.
///
/// Precedence for `errors` and `summary_metric`: status side, then the
/// result payload's own value, then empty. The result copies of those keys
/// are lifted out of `extra` so the merged view has exactly one of each.
#[must_use]
pub fn merge_result(fields: StatusFields<'_>, result: &ResultPayload) -> MergedResult {
    let mut result = result.clone();

    let result_errors = result
        .extra
        .remove(ERRORS_KEY)
        .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok());

    let mut result_metric = None;
    for key in METRIC_KEYS {
        if let Some(metric) = result.extra.remove(key).and_then(parse_metric) {
            result_metric.get_or_insert(metric);
        }
    }

    MergedResult {
        errors: fields
            .errors
            .map(<[String]>::to_vec)
            .or(result_errors)
            .unwrap_or_default(),
        summary_metric: fields.summary_metric.or(result_metric),
        result,
    }
}

fn parse_metric(value: Value) -> Option<SummaryMetric> {
    serde_json::from_value(value).ok()
}
