use crate::error::TasksDomainError;

/// Remote task state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                // A short job can finish between two polls
                | (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn transition_to(self, next: Self) -> Result<Self, TasksDomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TasksDomainError::InvalidTransition {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue item state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl ItemState {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            // Normal flow
            (Self::Pending, Self::Uploading)
                | (Self::Uploading, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                // Transport failure before the processing phase
                | (Self::Uploading, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Uploading or Processing: a request for this item is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }

    pub fn transition_to(self, next: Self) -> Result<Self, TasksDomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TasksDomainError::InvalidTransition {
                from: format!("{self:?}"),
                to: format!("{next:?}"),
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
