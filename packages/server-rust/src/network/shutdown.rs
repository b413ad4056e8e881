//! Health state, in-flight request accounting, and call cancellation for
//! graceful shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Lifecycle reported by `/health`: Starting -> Ready -> Draining -> Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// In-flight counter shared with the guards; `drained` fires whenever the
/// count drops to zero.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicU64,
    drained: Notify,
}

/// Drives the HTTP side of shutdown.
///
/// Every request holds an [`InFlightGuard`] and runs its calls under a child
/// of [`call_token`](Self::call_token). Shutdown moves the state to
/// `Draining`, waits for the guards with [`wait_for_drain`](Self::wait_for_drain),
/// and cancels the calls that outlive the window with
/// [`cancel_in_flight`](Self::cancel_in_flight). Forwarded calls react to
/// that by abandoning their pending reply.
#[derive(Debug)]
pub struct ShutdownController {
    calls: CancellationToken,
    in_flight: Arc<InFlight>,
    health_state: ArcSwap<HealthState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: CancellationToken::new(),
            in_flight: Arc::new(InFlight::default()),
            health_state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining`. Running calls are left alone.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
    }

    /// A fresh token for one request's calls. Cancelled by
    /// `cancel_in_flight()`, or independently by its owner.
    #[must_use]
    pub fn call_token(&self) -> CancellationToken {
        self.calls.child_token()
    }

    /// Cancels every call derived from `call_token()`, including ones that
    /// start afterwards.
    pub fn cancel_in_flight(&self) {
        self.calls.cancel();
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Counts one request as in flight until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Waits up to `timeout` for the in-flight count to reach zero.
    ///
    /// Returns `true` and moves to `Stopped` once drained; returns `false`
    /// on timeout and leaves the state unchanged.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let drained = self.in_flight.drained.notified();
            tokio::pin!(drained);
            // Register before checking so a guard dropped in between is seen.
            drained.as_mut().enable();

            if self.in_flight_count() == 0 {
                self.health_state.store(Arc::new(HealthState::Stopped));
                return true;
            }
            if tokio::time::timeout_at(deadline, drained).await.is_err() {
                return false;
            }
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, waking drain waiters at zero.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.drained.notify_waiters();
        }
    }
}
