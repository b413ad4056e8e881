//! The layered call service every request handler dispatches through.

use serde_json::value::RawValue;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::DeadlineLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{RpcCall, RpcError};
use crate::service::router::RpcRouter;

/// The fully layered call service shared by every request handler.
pub type CallPipeline = BoxCloneService<RpcCall, Box<RawValue>, RpcError>;

/// Build the call pipeline by wrapping the `RpcRouter` with middleware layers.
///
/// `MetricsLayer` sits outermost so shed, timed-out and cancelled calls are
/// all counted with their outcome. `LoadShedLayer` comes next and rejects
/// before any work starts; `DeadlineLayer` wraps the router directly.
///
/// The result is boxed and cloneable so each HTTP request can take its own
/// handle; clones share the load-shedding permits.
#[must_use]
pub fn build_call_pipeline(router: RpcRouter, config: &ServerConfig) -> CallPipeline {
    let svc = ServiceBuilder::new()
        .layer(MetricsLayer)
        .layer(LoadShedLayer::new(config.max_concurrent_calls))
        .layer(DeadlineLayer)
        .service(router);
    BoxCloneService::new(svc)
}
