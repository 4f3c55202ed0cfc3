mod api;
mod error;

pub use api::{QueueApi, TaskApi};
pub use error::RemoteError;
