//! Per-call deadline and cancellation.
//!
//! A call ends at whichever comes first: the inner service answering, its
//! `call_timeout_ms` elapsing (`RpcError::Timeout`), or its cancellation
//! token firing (`RpcError::Cancelled`). On timeout the token is cancelled
//! too, so a forwarded call stops waiting for a reply nobody will read.

use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::value::RawValue;
use tower::{Layer, Service};

use crate::service::operation::{RpcCall, RpcError};

#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineLayer;

impl<S> Layer<S> for DeadlineLayer {
    type Service = Deadline<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Deadline { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Deadline<S> {
    inner: S,
}

impl<S> Service<RpcCall> for Deadline<S>
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
        let timeout_ms = call.ctx.call_timeout_ms;
        let token = call.ctx.cancel.clone();
        let answer = self.inner.call(call);

        async move {
            if token.is_cancelled() {
                return Err(RpcError::Cancelled);
            }
            tokio::select! {
                result = answer => result,
                () = token.cancelled() => Err(RpcError::Cancelled),
                () = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                    token.cancel();
                    Err(RpcError::Timeout { timeout_ms })
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde_json::json;
    use tower::service_fn;
    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::raw_json::{raw, raw_args};
    use crate::service::operation::CallContext;

    async fn answer_after(call: RpcCall) -> Result<Box<RawValue>, RpcError> {
        let ms = call.params.first().and_then(|p| p.get().parse::<u64>().ok()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(raw(&json!(call.method)))
    }

    fn call(delay_ms: u64, timeout_ms: u64) -> RpcCall {
        RpcCall::new(
            CallContext::new(7, timeout_ms),
            "arbtrace",
            "block",
            raw_args(&[json!(delay_ms)]),
        )
    }

    #[tokio::test]
    async fn fast_answer_passes_through() {
        let svc = DeadlineLayer.layer(service_fn(answer_after));
        assert_eq!(svc.oneshot(call(5, 1000)).await.unwrap().get(), r#""block""#);
    }

    #[tokio::test]
    async fn slow_answer_times_out_and_cancels_the_token() {
        let svc = DeadlineLayer.layer(service_fn(answer_after));
        let slow = call(300, 40);
        let token = slow.ctx.cancel.clone();

        let err = svc.oneshot(slow).await.unwrap_err();
        assert!(matches!(err, RpcError::Timeout { timeout_ms: 40 }));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_token_ends_the_call_early() {
        let svc = DeadlineLayer.layer(service_fn(answer_after));
        let pending = call(5_000, 10_000);
        let token = pending.ctx.cancel.clone();

        let handle = tokio::spawn(svc.oneshot(pending));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, RpcError::Cancelled));
    }

    #[tokio::test]
    async fn already_cancelled_call_never_runs() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let svc = DeadlineLayer.layer(service_fn(move |_call: RpcCall| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, RpcError>(raw(&json!(null)))
            }
        }));
        let doomed = call(0, 1000);
        doomed.ctx.cancel.cancel();

        assert!(matches!(svc.oneshot(doomed).await, Err(RpcError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
