//! Single-slot behavior task scheduler.
//!
//! At most one behavior task runs per active session. Starting a new
//! behavior aborts the previous one before the new task is spawned, so
//! there is no window in which two repeating timers are live. Stop is
//! idempotent.

use golem_core::BehaviorKind;
use tokio::task::JoinHandle;

struct RunningBehavior {
    kind: BehaviorKind,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct BehaviorScheduler {
    slot: Option<RunningBehavior>,
}

impl BehaviorScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot: abort whatever is running, then spawn the new
    /// task. The spawn closure runs only after the previous abort.
    pub fn start(&mut self, kind: BehaviorKind, spawn: impl FnOnce() -> JoinHandle<()>) {
        self.stop();
        tracing::debug!(behavior = kind.as_str(), "behavior started");
        self.slot = Some(RunningBehavior {
            kind,
            handle: spawn(),
        });
    }

    /// Abort the current behavior, if any.
    pub fn stop(&mut self) {
        if let Some(prev) = self.slot.take() {
            prev.handle.abort();
            tracing::debug!(behavior = prev.kind.as_str(), "behavior stopped");
        }
    }

    /// Kind currently occupying the slot. A task that self-cancelled
    /// still occupies the slot until replaced or stopped; callers that
    /// care should also check [`Self::is_running`].
    pub fn current(&self) -> Option<&BehaviorKind> {
        self.slot.as_ref().map(|b| &b.kind)
    }

    pub fn is_running(&self) -> bool {
        self.slot.as_ref().is_some_and(|b| !b.handle.is_finished())
    }
}
