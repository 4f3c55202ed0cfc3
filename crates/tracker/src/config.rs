use std::time::Duration;

use courier_tasks_domain::ItemPolicy;

use crate::error::TrackerError;
use crate::progress::ProgressModel;

fn default_interval_ms() -> u64 {
    2_000
}

fn default_max_consecutive_errors() -> Option<u32> {
    Some(10)
}

/// Polling behaviour of a [`TaskLifecycleController`](crate::TaskLifecycleController).
///
/// `None` limits are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Poll errors in a row before the task is failed locally.
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: Option<u32>,
    /// Ticks before a task that never reaches a terminal state is failed locally.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_errors: default_max_consecutive_errors(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.interval_ms == 0 {
            return Err(TrackerError::InvalidConfig(
                "interval_ms must be positive".to_string(),
            ));
        }
        if self.max_consecutive_errors == Some(0) || self.max_attempts == Some(0) {
            return Err(TrackerError::InvalidConfig(
                "poll limits must be positive or unset".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_tick_ms() -> u64 {
    300
}

fn default_step() -> u8 {
    5
}

fn default_ceiling() -> u8 {
    90
}

fn default_upload_share() -> u8 {
    30
}

/// Acceptance rules and synthetic progress settings of a
/// [`QueueScheduler`](crate::QueueScheduler).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub policy: ItemPolicy,
    /// Interval between synthetic progress increments.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Percent added per tick.
    #[serde(default = "default_step")]
    pub step: u8,
    /// Highest percent shown before the response arrives. Must be below 100.
    #[serde(default = "default_ceiling")]
    pub ceiling: u8,
    /// Percent at which an item moves from Uploading to Processing.
    #[serde(default = "default_upload_share")]
    pub upload_share: u8,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            policy: ItemPolicy::default(),
            tick_ms: default_tick_ms(),
            step: default_step(),
            ceiling: default_ceiling(),
            upload_share: default_upload_share(),
        }
    }
}

impl QueueConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn progress_model(&self) -> ProgressModel {
        ProgressModel::new(self.step, self.ceiling, self.upload_share)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.tick_ms == 0 || self.step == 0 {
            return Err(TrackerError::InvalidConfig(
                "tick_ms and step must be positive".to_string(),
            ));
        }
        if self.ceiling >= 100 {
            return Err(TrackerError::InvalidConfig(format!(
                "ceiling {} must be below 100",
                self.ceiling
            )));
        }
        if self.upload_share > self.ceiling {
            return Err(TrackerError::InvalidConfig(format!(
                "upload_share {} exceeds ceiling {}",
                self.upload_share, self.ceiling
            )));
        }
        Ok(())
    }
}
