pub mod error;
pub mod ids;
pub mod item;
pub mod payloads;
pub mod reconcile;
pub mod stage;
pub mod state;
pub mod task;

pub use error::TasksDomainError;
pub use ids::{ItemId, TaskId};
pub use item::{ItemOutcome, ItemPayload, ItemPolicy, QueueItem};
pub use payloads::{
    ResultPayload, StartTaskRequest, StatusPayload, SubmitOptions, SubmitResponse, SummaryMetric,
    TaskCreated,
};
pub use reconcile::{StatusFields, merge_result, reconcile};
pub use stage::StageCatalog;
pub use state::{ItemState, TaskState};
pub use task::{MergedResult, Task};
