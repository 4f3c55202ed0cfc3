/// Errors for task and queue item domain validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TasksDomainError {
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("invalid item id: {0}")]
    InvalidItemId(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("{name}: unsupported format '{format}'")]
    UnsupportedFormat { name: String, format: String },

    #[error("{name}: {size} bytes exceeds the {max} byte limit")]
    TooLarge { name: String, size: u64, max: u64 },

    #[error("{name}: file is empty")]
    EmptyPayload { name: String },
}
