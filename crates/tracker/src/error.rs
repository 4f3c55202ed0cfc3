use courier_remote::RemoteError;
use courier_tasks_domain::ItemId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("a run is already active on this queue")]
    AlreadyRunning,

    #[error("queue cannot be modified while a run is active")]
    RunInProgress,

    #[error("item {0} is being submitted")]
    ItemInFlight(ItemId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),
}
