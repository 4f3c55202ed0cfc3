use courier_remote::RemoteError;
use serde_json::Value;

#[allow(clippy::needless_pass_by_value)] // signature required for use with .map_err()
pub(crate) fn map_reqwest_err(e: reqwest::Error) -> RemoteError {
    if e.is_connect() || e.is_timeout() {
        RemoteError::Connection(e.to_string())
    } else if e.is_builder() {
        RemoteError::Other(format!("invalid request: {e}"))
    } else {
        RemoteError::Other(e.to_string())
    }
}

/// Error for a non-success response. Bad request and unprocessable entity
/// are the backend's way of rejecting the submitted configuration.
pub(crate) fn status_error(status: u16, body: &str) -> RemoteError {
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        400 | 422 => RemoteError::Validation(message),
        _ => RemoteError::Status { status, message },
    }
}

/// Prefer the `error` or `message` field of a JSON body, else the raw text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return Some(msg.clone());
            }
        }
    }
    Some(body.to_string())
}
