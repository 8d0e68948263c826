//! Load handles: one terminal outcome per load.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::LoadError;
use crate::state::ContentState;

/// How a load ended.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The pipeline ran to the end.
    Completed(ContentState),
    /// The pipeline stopped at a fatal error or timed out.
    Failed(LoadError),
    /// A newer load superseded this one, or the host was dropped.
    Cancelled,
}

impl LoadOutcome {
    /// The content state, if the load completed.
    #[must_use]
    pub const fn state(&self) -> Option<&ContentState> {
        match self {
            Self::Completed(state) => Some(state),
            _ => None,
        }
    }

    /// The error, if the load failed.
    #[must_use]
    pub const fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the load was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Default)]
pub(crate) struct Slot {
    outcome: Mutex<Option<LoadOutcome>>,
    ready: Condvar,
}

impl Slot {
    /// Store the outcome unless one is already there. Returns whether this
    /// call resolved the slot.
    pub(crate) fn resolve(&self, outcome: LoadOutcome) -> bool {
        let mut guard = self.outcome.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(outcome);
        let _ = self.ready.notify_all();
        true
    }
}

/// A promise for the outcome of one load.
///
/// Outcomes are resolved on the host's control thread, inside
/// [`ContentHost::pump`](crate::ContentHost::pump) and friends, except for
/// supersession and teardown, which resolve immediately. Blocking with
/// [`wait`](Self::wait) on the control thread itself therefore never
/// returns for a load still in flight; wait from another thread, or drive
/// the host with [`run_until_idle`](crate::ContentHost::run_until_idle)
/// and read [`try_outcome`](Self::try_outcome).
#[derive(Clone)]
pub struct LoadHandle {
    generation: u64,
    slot: Arc<Slot>,
}

impl LoadHandle {
    pub(crate) const fn new(generation: u64, slot: Arc<Slot>) -> Self {
        Self { generation, slot }
    }

    /// Generation of the load this handle tracks.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The outcome, if the load has ended.
    #[must_use]
    pub fn try_outcome(&self) -> Option<LoadOutcome> {
        self.slot.outcome.lock().clone()
    }

    /// Whether the load has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.slot.outcome.lock().is_some()
    }

    /// Block until the load ends.
    #[must_use]
    pub fn wait(&self) -> LoadOutcome {
        let mut guard = self.slot.outcome.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            self.slot.ready.wait(&mut guard);
        }
    }

    /// Block until the load ends or `timeout` passes.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<LoadOutcome> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.slot.outcome.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return Some(outcome.clone());
            }
            if self.slot.ready.wait_until(&mut guard, deadline).timed_out() {
                return guard.clone();
            }
        }
    }
}

impl std::fmt::Debug for LoadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadHandle")
            .field("generation", &self.generation)
            .field("finished", &self.is_finished())
            .finish()
    }
}
