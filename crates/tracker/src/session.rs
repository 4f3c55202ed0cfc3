use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use courier_tasks_domain::TaskId;

/// Shortest tick period; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What a session does after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Halt,
}

/// Callback driven by a [`PollingSession`] once per interval.
#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self, task_id: &TaskId) -> TickFlow;
}

struct ArmedSession {
    task_id: TaskId,
    token: CancellationToken,
    active: Arc<AtomicBool>,
}

/// Owned recurring-check timer for one task.
///
/// At most one timer is armed per session value: arming again disarms the
/// previous one first. After [`disarm`](Self::disarm) returns no new tick
/// starts, and a tick that is mid-flight is dropped at its next await point.
/// Dropping the session disarms it.
#[derive(Default)]
pub struct PollingSession {
    armed: Option<ArmedSession>,
    arm_count: u64,
}

impl PollingSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking `handler` for `task_id`. The first tick fires
    /// immediately, then once per `interval` (at least one millisecond).
    pub fn arm(&mut self, task_id: TaskId, interval: Duration, handler: Box<dyn TickHandler>) {
        self.disarm();
        let interval = interval.max(MIN_INTERVAL);

        let token = CancellationToken::new();
        let active = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_session_loop(SessionParams {
            task_id: task_id.clone(),
            interval,
            handler,
            token: token.clone(),
            active: active.clone(),
        }));

        self.arm_count += 1;
        tracing::debug!(task_id = %task_id, interval_ms = interval.as_millis() as u64, "polling session armed");
        self.armed = Some(ArmedSession {
            task_id,
            token,
            active,
        });
    }

    /// Stop ticking. Returns whether a live timer was stopped; calling it
    /// on an idle session is a no-op.
    pub fn disarm(&mut self) -> bool {
        let Some(session) = self.armed.take() else {
            return false;
        };
        session.token.cancel();
        let was_active = session.active.swap(false, Ordering::AcqRel);
        if was_active {
            tracing::debug!(task_id = %session.task_id, "polling session disarmed");
        }
        was_active
    }

    /// True while a timer is ticking. Turns false once the handler halts.
    pub fn is_armed(&self) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|s| s.active.load(Ordering::Acquire))
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.armed.as_ref().map(|s| &s.task_id)
    }

    /// Number of times this session has been armed.
    pub fn arm_count(&self) -> u64 {
        self.arm_count
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.disarm();
    }
}

struct SessionParams {
    task_id: TaskId,
    interval: Duration,
    handler: Box<dyn TickHandler>,
    token: CancellationToken,
    active: Arc<AtomicBool>,
}

async fn run_session_loop(params: SessionParams) {
    let SessionParams {
        task_id,
        interval,
        handler,
        token,
        active,
    } = params;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Cancellation is checked again before the handler is first polled,
        // so a disarm racing the timer never starts a new tick.
        let flow = tokio::select! {
            biased;
            () = token.cancelled() => break,
            flow = handler.on_tick(&task_id) => flow,
        };

        if flow == TickFlow::Halt {
            tracing::debug!(task_id = %task_id, "polling session halted by handler");
            break;
        }
    }

    active.store(false, Ordering::Release);
}
