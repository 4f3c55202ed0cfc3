mod config;
mod controller;
mod error;
mod progress;
mod queue;
mod session;

pub use config::{PollConfig, QueueConfig};
pub use controller::{TaskLifecycleController, TaskOutcome, TaskView};
pub use error::{QueueError, TrackerError};
pub use progress::ProgressModel;
pub use queue::{EnqueueReport, QueueScheduler, QueueView, Rejection, RunSummary};
pub use session::{PollingSession, TickFlow, TickHandler};
