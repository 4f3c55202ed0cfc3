use courier_tasks_domain::item::IN_FLIGHT_PROGRESS_MAX;

/// Capped interpolation of progress during a call the remote reports
/// nothing about. The estimate climbs by `step` per tick, stops at
/// `ceiling`, and is replaced by the real value (100 or 0) on response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressModel {
    step: u8,
    ceiling: u8,
    upload_share: u8,
}

impl ProgressModel {
    /// `ceiling` is clamped below 100 and `upload_share` to the ceiling.
    #[must_use]
    pub fn new(step: u8, ceiling: u8, upload_share: u8) -> Self {
        let ceiling = ceiling.min(IN_FLIGHT_PROGRESS_MAX);
        Self {
            step: step.max(1),
            ceiling,
            upload_share: upload_share.min(ceiling),
        }
    }

    pub fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Estimate after one more tick.
    pub fn next(&self, current: u8) -> u8 {
        current
            .saturating_add(self.step)
            .min(self.ceiling)
            .max(current)
    }

    /// Whether an item at `progress` has moved past its transfer phase.
    pub fn in_processing_phase(&self, progress: u8) -> bool {
        progress >= self.upload_share
    }
}
