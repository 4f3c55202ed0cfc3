//! Sequential submission queue: local items are sent to the remote one at a
//! time, with interpolated progress while each single-shot call is pending.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use courier_remote::QueueApi;
use courier_tasks_domain::{
    ItemId, ItemPayload, ItemState, QueueItem, SubmitOptions, TasksDomainError,
};

use crate::config::QueueConfig;
use crate::error::{QueueError, TrackerError};
use crate::progress::ProgressModel;

const INTERRUPTED_REASON: &str = "run interrupted";

/// Ordered list of items plus the run flag, published through `watch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueView {
    pub items: Vec<QueueItem>,
    pub running: bool,
}

impl QueueView {
    pub fn item(&self, id: &ItemId) -> Option<&QueueItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn item_mut(&mut self, id: &ItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|item| item.state() == state).count()
    }
}

/// A candidate refused at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub reason: TasksDomainError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// Ids of accepted items, in submission order.
    pub accepted: Vec<ItemId>,
    pub rejected: Vec<Rejection>,
}

impl EnqueueReport {
    /// Human-readable rejection messages, one per refused candidate.
    pub fn reasons(&self) -> Vec<String> {
        self.rejected.iter().map(|r| r.reason.to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Processes queued items strictly one after another. A failing item never
/// stops the run.
pub struct QueueScheduler {
    remote: Arc<dyn QueueApi>,
    config: QueueConfig,
    model: ProgressModel,
    options: SubmitOptions,
    view: watch::Sender<QueueView>,
}

impl QueueScheduler {
    pub fn new(remote: Arc<dyn QueueApi>, config: QueueConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let (view, _) = watch::channel(QueueView::default());
        Ok(Self {
            remote,
            model: config.progress_model(),
            config,
            options: SubmitOptions::default(),
            view,
        })
    }

    /// Options sent alongside every item.
    #[must_use]
    pub fn with_options(mut self, options: SubmitOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate candidates and append the accepted ones as Pending items.
    /// Allowed while a run is active; the run picks them up.
    pub fn enqueue(&self, candidates: impl IntoIterator<Item = ItemPayload>) -> EnqueueReport {
        let mut report = EnqueueReport::default();
        let mut accepted = Vec::new();

        for payload in candidates {
            match self.config.policy.check(&payload) {
                Ok(()) => {
                    let item = QueueItem::new(payload);
                    report.accepted.push(item.id.clone());
                    accepted.push(item);
                }
                Err(reason) => {
                    tracing::info!(name = %payload.name, reason = %reason, "item rejected");
                    report.rejected.push(Rejection {
                        name: payload.name,
                        reason,
                    });
                }
            }
        }

        if !accepted.is_empty() {
            tracing::debug!(count = accepted.len(), "items enqueued");
            self.view.send_modify(|view| view.items.extend(accepted));
        }
        report
    }

    /// Submit every Pending item in order until none is left.
    pub async fn run(&self) -> Result<RunSummary, QueueError> {
        self.begin_run()?;
        let _guard = RunGuard { view: &self.view };
        tracing::info!("queue run started");

        let mut summary = RunSummary::default();
        while let Some((id, payload)) = self.next_pending() {
            tracing::debug!(item_id = %id, name = %payload.name, "submitting item");
            let outcome = self.submit(&id, &payload).await;

            match &outcome {
                Ok(_) => {
                    summary.completed += 1;
                    tracing::info!(item_id = %id, name = %payload.name, "item completed");
                }
                Err(reason) => {
                    summary.failed += 1;
                    tracing::warn!(item_id = %id, name = %payload.name, reason = %reason, "item failed");
                }
            }
            self.finish(&id, outcome);
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            "queue run finished"
        );
        Ok(summary)
    }

    /// Remove an item that is not currently being submitted.
    pub fn remove(&self, id: &ItemId) -> Result<QueueItem, QueueError> {
        let mut outcome = Err(QueueError::UnknownItem(id.clone()));
        self.view.send_if_modified(|view| {
            let Some(index) = view.items.iter().position(|item| &item.id == id) else {
                return false;
            };
            if view.items[index].state().is_in_flight() {
                outcome = Err(QueueError::ItemInFlight(id.clone()));
                return false;
            }
            outcome = Ok(view.items.remove(index));
            true
        });
        outcome
    }

    /// Drop every item. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut outcome = Err(QueueError::RunInProgress);
        self.view.send_if_modified(|view| {
            if view.running {
                return false;
            }
            let removed = view.items.len();
            view.items.clear();
            outcome = Ok(removed);
            removed > 0
        });
        outcome
    }

    /// Put every Failed item back in line as a fresh Pending item with the
    /// same payload. Returns the new ids.
    pub fn retry_failed(&self) -> Result<Vec<ItemId>, QueueError> {
        let mut outcome = Err(QueueError::RunInProgress);
        self.view.send_if_modified(|view| {
            if view.running {
                return false;
            }
            let mut requeued = Vec::new();
            for item in view.items.iter_mut() {
                if item.state() == ItemState::Failed {
                    *item = QueueItem::new(item.payload.clone());
                    requeued.push(item.id.clone());
                }
            }
            let changed = !requeued.is_empty();
            outcome = Ok(requeued);
            changed
        });
        outcome
    }

    pub fn snapshot(&self) -> QueueView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueView> {
        self.view.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.view.borrow().running
    }

    fn begin_run(&self) -> Result<(), QueueError> {
        let mut started = false;
        self.view.send_if_modified(|view| {
            if view.running {
                return false;
            }
            view.running = true;
            started = true;
            true
        });
        if started {
            Ok(())
        } else {
            Err(QueueError::AlreadyRunning)
        }
    }

    /// Claim the first Pending item and move it to Uploading.
    fn next_pending(&self) -> Option<(ItemId, ItemPayload)> {
        let mut claimed = None;
        self.view.send_if_modified(|view| {
            let Some(item) = view
                .items
                .iter_mut()
                .find(|item| item.state() == ItemState::Pending)
            else {
                return false;
            };
            if let Err(e) = item.begin_upload() {
                tracing::error!(item_id = %item.id, error = %e, "cannot start item");
                return false;
            }
            claimed = Some((item.id.clone(), item.payload.clone()));
            true
        });
        claimed
    }

    /// One submit call, with progress ticks until it resolves.
    async fn submit(&self, id: &ItemId, payload: &ItemPayload) -> Result<Value, String> {
        let call = self.remote.submit_item(payload, &self.options);
        tokio::pin!(call);

        let tick = self.config.tick();
        let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                reply = &mut call => {
                    return match reply {
                        Ok(response) => response.into_outcome(),
                        Err(e) => Err(e.to_string()),
                    };
                }
                _ = ticker.tick() => self.advance(id),
            }
        }
    }

    fn advance(&self, id: &ItemId) {
        let model = self.model;
        self.view.send_if_modified(|view| {
            let Some(item) = view.item_mut(id) else {
                return false;
            };
            if !item.state().is_in_flight() {
                return false;
            }
            let before = (item.state(), item.progress());
            item.raise_progress(model.next(item.progress()));
            if item.state() == ItemState::Uploading && model.in_processing_phase(item.progress()) {
                if let Err(e) = item.enter_processing() {
                    tracing::error!(item_id = %id, error = %e, "cannot enter processing");
                }
            }
            before != (item.state(), item.progress())
        });
    }

    fn finish(&self, id: &ItemId, outcome: Result<Value, String>) {
        self.view.send_if_modified(|view| {
            let Some(item) = view.item_mut(id) else {
                return false;
            };
            let applied = match outcome {
                Ok(result) => item.complete(result),
                Err(reason) => item.fail(reason),
            };
            if let Err(e) = applied {
                tracing::error!(item_id = %id, error = %e, "cannot record item outcome");
                return false;
            }
            true
        });
    }
}

/// Clears the run flag when a run ends, including when the `run` future is
/// dropped mid-item. An item left in flight by a dropped run is failed.
struct RunGuard<'a> {
    view: &'a watch::Sender<QueueView>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.view.send_modify(|view| {
            view.running = false;
            for item in view.items.iter_mut() {
                if !item.state().is_in_flight() {
                    continue;
                }
                if let Err(e) = item.fail(INTERRUPTED_REASON) {
                    tracing::error!(item_id = %item.id, error = %e, "cannot fail interrupted item");
                }
            }
        });
    }
}
