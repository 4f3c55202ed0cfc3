use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Validation and decoding failures repeat deterministically; 4xx
    /// statuses other than 408 and 429 are treated the same way.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Other(_) => true,
            Self::Status { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            Self::Validation(_) | Self::Serialization(_) => false,
        }
    }
}
