//! Call routing: dispatches `RpcCall` to a redirect or a local handler by namespace.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use relay_core::RpcHandler;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;
use tower::Service;

use super::operation::{RpcCall, RpcError};
use crate::redirect::{ForwardingInvoker, RedirectManager, RedirectSet};

type BoxedFuture = Pin<Box<dyn Future<Output = Result<Box<RawValue>, RpcError>> + Send>>;

// ---------------------------------------------------------------------------
// NamespaceRouter
// ---------------------------------------------------------------------------

/// Where a call goes.
#[derive(Debug, Clone, Copy)]
pub enum Route<'a> {
    /// Served by this node's own handlers, if any.
    Local,
    /// Forwarded through the given manager.
    Redirect(&'a Arc<RedirectManager>),
}

/// Per-call routing decision against the fixed set of redirects.
///
/// Only enabled targets are in the set, so a namespace with a blank endpoint
/// routes `Local` and ends up as "method not found" unless something local
/// happens to serve it.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRouter {
    redirects: Arc<RedirectSet>,
}

impl NamespaceRouter {
    #[must_use]
    pub fn new(redirects: Arc<RedirectSet>) -> Self {
        Self { redirects }
    }

    /// Pure lookup: exact namespace match on an enabled target.
    #[must_use]
    pub fn route(&self, namespace: &str) -> Route<'_> {
        match self.redirects.manager(namespace) {
            Some(manager) => Route::Redirect(manager),
            None => Route::Local,
        }
    }

    #[must_use]
    pub fn redirects(&self) -> &Arc<RedirectSet> {
        &self.redirects
    }
}

// ---------------------------------------------------------------------------
// RpcRouter
// ---------------------------------------------------------------------------

/// Routes `RpcCall` values to the forwarding invoker or a local handler.
///
/// Redirects take precedence: a namespace that is both redirected and served
/// locally is always forwarded. Calls to a namespace nobody serves return
/// `RpcError::MethodNotFound`.
///
/// Cloning is cheap; clones share the handler table and redirect set.
#[derive(Clone)]
pub struct RpcRouter {
    namespaces: NamespaceRouter,
    handlers: Arc<HashMap<&'static str, Arc<dyn RpcHandler>>>,
    invoker: ForwardingInvoker,
}

impl RpcRouter {
    /// Create a router with no local handlers.
    #[must_use]
    pub fn new(namespaces: NamespaceRouter) -> Self {
        Self {
            namespaces,
            handlers: Arc::new(HashMap::new()),
            invoker: ForwardingInvoker,
        }
    }

    /// Register a local handler under its namespace, replacing any previous one.
    pub fn register<H: RpcHandler + 'static>(&mut self, handler: H) {
        let handler: Arc<dyn RpcHandler> = Arc::new(handler);
        Arc::make_mut(&mut self.handlers).insert(handler.namespace(), handler);
    }

    /// Every namespace this router answers for, local and redirected, sorted.
    #[must_use]
    pub fn served_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|ns| (*ns).to_string())
            .chain(
                self.namespaces
                    .redirects()
                    .namespaces()
                    .into_iter()
                    .map(str::to_string),
            )
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    #[must_use]
    pub fn namespaces(&self) -> &NamespaceRouter {
        &self.namespaces
    }
}

impl Service<RpcCall> for RpcRouter {
    type Response = Box<RawValue>;
    type Error = RpcError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: RpcCall) -> Self::Future {
        match self.namespaces.route(&call.namespace) {
            Route::Redirect(manager) => {
                let manager = Arc::clone(manager);
                let invoker = self.invoker;
                Box::pin(async move { invoker.invoke(&manager, call).await })
            }
            Route::Local => match self.handlers.get(call.namespace.as_str()) {
                Some(handler) => {
                    let handler = Arc::clone(handler);
                    Box::pin(async move { call_local(handler.as_ref(), call).await })
                }
                None => {
                    let method = call.full_method();
                    Box::pin(async move { Err(RpcError::MethodNotFound { method }) })
                }
            },
        }
    }
}

/// Local handlers work on parsed values; only forwarded calls keep the
/// caller's exact text.
async fn call_local(handler: &dyn RpcHandler, call: RpcCall) -> Result<Box<RawValue>, RpcError> {
    let params = call
        .params
        .iter()
        .map(|p| serde_json::from_str::<Value>(p.get()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RpcError::InvalidParams(e.to_string()))?;
    let value = handler
        .handle(&call.method, params)
        .await
        .map_err(RpcError::Local)?;
    to_raw_value(&value).map_err(|e| RpcError::Internal(e.into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use relay_core::{codes, ErrorObject};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::redirect::RedirectTarget;
    use crate::service::operation::raw_json::{parsed, raw_args};
    use crate::service::operation::CallContext;

    /// Local handler answering every method with `"<namespace>:<method>"`.
    struct EchoHandler(&'static str);

    #[async_trait]
    impl RpcHandler for EchoHandler {
        fn namespace(&self) -> &'static str {
            self.0
        }

        async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Value, ErrorObject> {
            match method {
                "fail" => Err(ErrorObject::new(-32000, "local failure")),
                "params" => Ok(Value::Array(params)),
                _ => Ok(json!(format!("{}:{method}", self.0))),
            }
        }
    }

    fn redirects(endpoint: &str) -> Arc<RedirectSet> {
        let target = RedirectTarget::new("arbtrace", endpoint, Duration::from_millis(50));
        Arc::new(RedirectSet::new(&[target], 1024).unwrap())
    }

    fn make_call(namespace: &str, method: &str) -> RpcCall {
        RpcCall::new(CallContext::new(1, 5000), namespace, method, vec![])
    }

    #[test]
    fn routes_enabled_redirect_only() {
        let router = NamespaceRouter::new(redirects("127.0.0.1:9"));
        assert!(matches!(router.route("arbtrace"), Route::Redirect(_)));
        assert!(matches!(router.route("eth"), Route::Local));
        assert!(matches!(router.route("ArbTrace"), Route::Local));

        let disabled = NamespaceRouter::new(redirects(""));
        assert!(matches!(disabled.route("arbtrace"), Route::Local));
    }

    #[tokio::test]
    async fn routes_to_local_handler() {
        let mut router = RpcRouter::new(NamespaceRouter::default());
        router.register(EchoHandler("web3"));

        let value = router
            .oneshot(make_call("web3", "clientVersion"))
            .await
            .unwrap();
        assert_eq!(value.get(), r#""web3:clientVersion""#);
    }

    #[tokio::test]
    async fn local_handler_sees_parsed_params() {
        let mut router = RpcRouter::new(NamespaceRouter::default());
        router.register(EchoHandler("web3"));

        let call = RpcCall::new(
            CallContext::new(1, 5000),
            "web3",
            "params",
            raw_args(&[json!("0x1"), json!({"a": [1, 2]})]),
        );
        let value = router.oneshot(call).await.unwrap();
        assert_eq!(parsed(&value), json!(["0x1", {"a": [1, 2]}]));
    }

    #[tokio::test]
    async fn local_errors_pass_through() {
        let mut router = RpcRouter::new(NamespaceRouter::default());
        router.register(EchoHandler("web3"));

        let err = router.oneshot(make_call("web3", "fail")).await.unwrap_err();
        assert_eq!(err.to_error_object(), ErrorObject::new(-32000, "local failure"));
    }

    #[tokio::test]
    async fn unknown_namespace_is_method_not_found() {
        let router = RpcRouter::new(NamespaceRouter::default());
        let err = router.oneshot(make_call("eth", "chainId")).await.unwrap_err();
        assert!(matches!(
            &err,
            RpcError::MethodNotFound { method } if method == "eth_chainId"
        ));
    }

    #[tokio::test]
    async fn disabled_redirect_is_method_not_found() {
        let router = RpcRouter::new(NamespaceRouter::new(redirects("")));
        let err = router.oneshot(make_call("arbtrace", "call")).await.unwrap_err();
        assert_eq!(err.to_error_object().code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn redirect_takes_precedence_over_local_handler() {
        // Nothing listens on port 9, so a forwarded call fails with Connect
        // while a local one would have succeeded.
        let mut router = RpcRouter::new(NamespaceRouter::new(redirects("127.0.0.1:9")));
        router.register(EchoHandler("arbtrace"));

        let err = router.oneshot(make_call("arbtrace", "call")).await.unwrap_err();
        assert!(matches!(err, RpcError::Connect { .. }));
    }

    #[test]
    fn served_namespaces_include_redirects() {
        let mut router = RpcRouter::new(NamespaceRouter::new(redirects("127.0.0.1:9")));
        router.register(EchoHandler("web3"));
        router.register(EchoHandler("net"));
        assert_eq!(router.served_namespaces(), vec!["arbtrace", "net", "web3"]);
    }

    proptest! {
        #[test]
        fn only_the_configured_namespace_redirects(ns in "[A-Za-z][A-Za-z0-9]{0,12}") {
            let router = NamespaceRouter::new(redirects("127.0.0.1:9"));
            let redirected = matches!(router.route(&ns), Route::Redirect(_));
            prop_assert_eq!(redirected, ns == "arbtrace");
        }
    }
}
