//! Concurrency cap for calls.
//!
//! Each call takes a permit from a semaphore shared by every clone of the
//! pipeline and keeps it until its future resolves. With no permit left the
//! call fails at once with `RpcError::Overloaded` instead of queueing behind
//! slow traces.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::value::RawValue;
use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::debug;

use crate::service::operation::{RpcCall, RpcError};

#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    permits: Arc<Semaphore>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent_calls: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent_calls as usize)),
        }
    }

    /// Permits currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShed<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShed {
            inner,
            permits: Arc::clone(&self.permits),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadShed<S> {
    inner: S,
    permits: Arc<Semaphore>,
}

impl<S> Service<RpcCall> for LoadShed<S>
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
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => self
                .inner
                .call(call)
                .map(move |result| {
                    drop(permit);
                    result
                })
                .boxed(),
            Err(_) => {
                debug!(method = %call.full_method(), "shedding call");
                future::ready(Err(RpcError::Overloaded)).boxed()
            }
        }
    }
}
