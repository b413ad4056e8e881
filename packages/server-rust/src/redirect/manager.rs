//! Lazily-dialed, shared connection to one redirect target.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::connection::RedirectConnection;
use super::error::ForwardError;
use super::target::{Endpoint, RedirectTarget, TargetError};

/// First pause between dial attempts; doubles up to [`MAX_DIAL_BACKOFF`].
const INITIAL_DIAL_BACKOFF: Duration = Duration::from_millis(25);
const MAX_DIAL_BACKOFF: Duration = Duration::from_millis(250);

type DialFuture = Shared<BoxFuture<'static, Result<Arc<RedirectConnection>, ForwardError>>>;

/// Connection lifecycle as reported by [`RedirectManager::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No connection, none being dialed.
    Idle,
    /// A dial is in flight.
    Dialing,
    /// A live connection is cached.
    Ready,
    /// Shut down; no further connections will be made.
    Closed,
}

impl ManagerState {
    /// Returns the lowercase string representation used in health output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dialing => "dialing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

enum ConnState {
    Idle,
    Dialing(DialFuture),
    Ready(Arc<RedirectConnection>),
    Closed,
}

// ---------------------------------------------------------------------------
// RedirectManager
// ---------------------------------------------------------------------------

/// Owns the single outbound connection for one redirect target.
///
/// State machine: `Idle -> Dialing -> Ready -> Closed`, with
/// `Dialing -> Idle` on a failed dial and `Ready -> Dialing` when a cached
/// connection has been dropped by the peer.
///
/// Cold-start races are settled by letting the first caller spawn the dial
/// as a task and park a shared handle to it in the state. Every caller that
/// arrives while the dial is in flight awaits that same handle, so exactly
/// one dial happens and all of them see the same connection or the same
/// error. A failed dial is not cached.
pub struct RedirectManager {
    target: RedirectTarget,
    endpoint: Endpoint,
    max_frame_bytes: usize,
    state: Arc<Mutex<ConnState>>,
    dials: Arc<AtomicU64>,
}

impl RedirectManager {
    /// Creates a manager for `target` without connecting.
    ///
    /// # Errors
    ///
    /// Returns `TargetError` if the target's endpoint does not parse.
    pub fn new(target: RedirectTarget, max_frame_bytes: usize) -> Result<Self, TargetError> {
        let endpoint = Endpoint::parse(&target.endpoint)?;
        Ok(Self {
            target,
            endpoint,
            max_frame_bytes,
            state: Arc::new(Mutex::new(ConnState::Idle)),
            dials: Arc::new(AtomicU64::new(0)),
        })
    }

    #[must_use]
    pub fn target(&self) -> &RedirectTarget {
        &self.target
    }

    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of dials started so far. Retries inside one dial count once.
    #[must_use]
    pub fn dial_count(&self) -> u64 {
        self.dials.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        match &*self.state.lock() {
            ConnState::Idle => ManagerState::Idle,
            ConnState::Dialing(_) => ManagerState::Dialing,
            ConnState::Ready(conn) if conn.is_closed() => ManagerState::Idle,
            ConnState::Ready(_) => ManagerState::Ready,
            ConnState::Closed => ManagerState::Closed,
        }
    }

    /// Returns the shared connection, dialing it first if needed.
    ///
    /// # Errors
    ///
    /// `Connect` if the dial failed or timed out, `Closed` after shutdown.
    pub async fn connection(&self) -> Result<Arc<RedirectConnection>, ForwardError> {
        let dial = {
            let mut state = self.state.lock();
            let in_flight = match &*state {
                ConnState::Ready(conn) if !conn.is_closed() => return Ok(Arc::clone(conn)),
                ConnState::Closed => return Err(ForwardError::Closed),
                ConnState::Dialing(dial) => Some(dial.clone()),
                ConnState::Ready(_) => {
                    info!(
                        namespace = %self.target.namespace,
                        endpoint = %self.endpoint,
                        "redirect connection was lost, redialing"
                    );
                    None
                }
                ConnState::Idle => None,
            };
            match in_flight {
                Some(dial) => dial,
                None => {
                    let dial = self.spawn_dial();
                    *state = ConnState::Dialing(dial.clone());
                    dial
                }
            }
        };
        dial.await
    }

    /// Starts a dial task. Must be called with the state lock held so the
    /// task cannot observe the state before it is set to `Dialing`.
    fn spawn_dial(&self) -> DialFuture {
        self.dials.fetch_add(1, Ordering::Relaxed);

        let state = Arc::clone(&self.state);
        let endpoint = self.endpoint.clone();
        let namespace = self.target.namespace.clone();
        let connect_timeout = self.target.connect_timeout;
        let max_frame_bytes = self.max_frame_bytes;

        let task = tokio::spawn(async move {
            let outcome = dial_within(&endpoint, connect_timeout, max_frame_bytes).await;

            let mut guard = state.lock();
            if !matches!(&*guard, ConnState::Dialing(_)) {
                // Shut down while dialing: the fresh connection is not wanted.
                if let Ok(conn) = &outcome {
                    conn.abort();
                }
                return Err(ForwardError::Closed);
            }

            match &outcome {
                Ok(conn) => {
                    info!(namespace = %namespace, endpoint = %endpoint, "connected to redirect endpoint");
                    metrics::counter!("relay_redirect_dials_total", "namespace" => namespace, "outcome" => "ok")
                        .increment(1);
                    *guard = ConnState::Ready(Arc::clone(conn));
                }
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "redirect dial failed");
                    metrics::counter!("relay_redirect_dials_total", "namespace" => namespace, "outcome" => "error")
                        .increment(1);
                    *guard = ConnState::Idle;
                }
            }
            outcome
        });

        let label = self.endpoint.to_string();
        async move {
            task.await.unwrap_or_else(|join| {
                Err(ForwardError::Connect {
                    endpoint: label,
                    reason: join.to_string(),
                })
            })
        }
        .boxed()
        .shared()
    }

    /// Closes the cached connection, if any, and refuses further dials.
    ///
    /// Safe to call repeatedly and when no connection was ever made. A close
    /// failure is logged, never returned.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), ConnState::Closed);
        match previous {
            ConnState::Ready(conn) => match conn.close().await {
                Ok(()) => info!(namespace = %self.target.namespace, "redirect connection closed"),
                Err(e) => warn!(
                    namespace = %self.target.namespace,
                    endpoint = %self.endpoint,
                    error = %e,
                    "failed to close redirect connection cleanly"
                ),
            },
            ConnState::Dialing(_) => {
                debug!(namespace = %self.target.namespace, "closed while a dial was in flight");
            }
            ConnState::Idle | ConnState::Closed => {}
        }
    }
}

/// Dials `endpoint`, retrying with backoff until `connect_timeout` runs out.
///
/// An endpoint that refuses or does not exist yet (e.g. a classic node that
/// is still starting) is retried rather than failed on the first attempt, so
/// an unreachable endpoint fails after roughly `connect_timeout`.
async fn dial_within(
    endpoint: &Endpoint,
    connect_timeout: Duration,
    max_frame_bytes: usize,
) -> Result<Arc<RedirectConnection>, ForwardError> {
    let deadline = Instant::now() + connect_timeout;
    let mut backoff = INITIAL_DIAL_BACKOFF;
    let mut last_error = String::from("no attempt made");

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, RedirectConnection::dial(endpoint, max_frame_bytes))
            .await
        {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(e)) => {
                debug!(endpoint = %endpoint, error = %e, "redirect dial attempt failed");
                last_error = e.to_string();
            }
            Err(_elapsed) => {
                last_error = "connect attempt did not complete".to_string();
                break;
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(backoff.min(remaining)).await;
        backoff = (backoff * 2).min(MAX_DIAL_BACKOFF);
    }

    Err(ForwardError::Connect {
        endpoint: endpoint.to_string(),
        reason: format!(
            "gave up after {}ms: {last_error}",
            connect_timeout.as_millis()
        ),
    })
}

impl std::fmt::Debug for RedirectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectManager")
            .field("namespace", &self.target.namespace)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("dials", &self.dial_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
