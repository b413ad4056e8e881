//! Axum handlers and the state they share.

pub mod health;
pub mod rpc;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use rpc::rpc_handler;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::{NetworkConfig, ShutdownController};
use crate::redirect::RedirectSet;
use crate::service::{CallClassifier, CallPipeline};

/// Call-handling services the HTTP layer hands requests to.
#[derive(Clone)]
pub struct RpcServices {
    pub pipeline: SharedPipeline,
    pub classifier: Arc<CallClassifier>,
    pub redirects: Arc<RedirectSet>,
}

/// A `Sync` holder for the boxed call pipeline.
///
/// The pipeline itself is `Send` but not `Sync`, so requests clone their own
/// handle out of this shared slot. The lock is held only for the clone.
#[derive(Clone)]
pub struct SharedPipeline(Arc<Mutex<CallPipeline>>);

impl SharedPipeline {
    #[must_use]
    pub fn new(pipeline: CallPipeline) -> Self {
        Self(Arc::new(Mutex::new(pipeline)))
    }

    /// A handle for one request. Clones share load-shedding permits.
    #[must_use]
    pub fn handle(&self) -> CallPipeline {
        self.0.lock().clone()
    }
}

/// Handed to every handler through `State`.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    pub rpc: RpcServices,
    pub config: Arc<NetworkConfig>,
    /// When the router was built; `/health` reports uptime from it.
    pub start_time: Instant,
}
