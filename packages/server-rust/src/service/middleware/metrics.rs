//! Per-call span, log line, and metrics.
//!
//! Every call runs inside an `rpc_call` span and, once it resolves, bumps
//! `relay_rpc_calls_total{namespace,outcome}` and records
//! `relay_rpc_call_duration_seconds{namespace}`.

use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::value::RawValue;
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};

use crate::service::operation::{RpcCall, RpcError};

pub const CALLS_TOTAL: &str = "relay_rpc_calls_total";
pub const CALL_DURATION: &str = "relay_rpc_call_duration_seconds";

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = CallMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallMetrics { inner }
    }
}

#[derive(Debug, Clone)]
pub struct CallMetrics<S> {
    inner: S,
}

impl<S> Service<RpcCall> for CallMetrics<S>
where
    S: Service<RpcCall, Response = Box<RawValue>, Error = RpcError>,
    S::Future: Send + 'static,
{
    type Response = Box<RawValue>;
    type Error = RpcError;
    type Future = BoxFuture<'static, Result<Box<RawValue>, RpcError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), RpcError>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: RpcCall) -> Self::Future {
        let span = info_span!(
            "rpc_call",
            method = %call.full_method(),
            call_id = call.ctx.call_id,
            trace_id = %call.ctx.trace_id,
            outcome = field::Empty,
            duration_ms = field::Empty,
        );
        let namespace = call.namespace.clone();
        let started = Instant::now();
        let answer = self.inner.call(call);

        async move {
            let result = answer.await;
            observe(&namespace, &result, started.elapsed());
            result
        }
        .instrument(span)
        .boxed()
    }
}

/// Metric label for a call's namespace. Calls nobody serves share one label
/// so caller input cannot grow the label set.
fn namespace_label(namespace: &str, result: &Result<Box<RawValue>, RpcError>) -> String {
    match result {
        Err(RpcError::MethodNotFound { .. }) => "unknown".to_string(),
        _ => namespace.to_string(),
    }
}

fn observe(namespace: &str, result: &Result<Box<RawValue>, RpcError>, elapsed: Duration) {
    let outcome = result.as_ref().map_or_else(RpcError::outcome, |_| "ok");
    let label = namespace_label(namespace, result);
    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = elapsed.as_millis() as u64;

    let span = Span::current();
    span.record("outcome", outcome);
    span.record("duration_ms", duration_ms);

    ::metrics::counter!(CALLS_TOTAL, "namespace" => label.clone(), "outcome" => outcome).increment(1);
    ::metrics::histogram!(CALL_DURATION, "namespace" => label).record(elapsed.as_secs_f64());

    if let Err(RpcError::Internal(e)) = result {
        tracing::warn!(duration_ms, error = %e, "call failed");
    } else {
        tracing::debug!(duration_ms, outcome, "call complete");
    }
}
