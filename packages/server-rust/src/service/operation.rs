//! Call types carried through the RPC pipeline and the error taxonomy.

use relay_core::{join_method, ErrorObject};
use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::redirect::ForwardError;

// ---------------------------------------------------------------------------
// CallContext
// ---------------------------------------------------------------------------

/// Context carried with every call through the pipeline.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Node-local sequence number, used in logs.
    pub call_id: u64,
    /// Random id correlating log lines of one call across layers.
    pub trace_id: Uuid,
    /// Cancelled when the caller goes away or the node shuts down.
    pub cancel: CancellationToken,
    /// Deadline enforced by the timeout middleware.
    pub call_timeout_ms: u64,
}

impl CallContext {
    /// Creates a context with a fresh trace id and its own cancellation token.
    #[must_use]
    pub fn new(call_id: u64, call_timeout_ms: u64) -> Self {
        Self {
            call_id,
            trace_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            call_timeout_ms,
        }
    }

    /// Replaces the cancellation token, typically with a child of a request
    /// or shutdown token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

// ---------------------------------------------------------------------------
// RpcCall
// ---------------------------------------------------------------------------

/// One classified JSON-RPC call: the method name split into namespace and
/// method, with positional arguments kept as the caller's raw JSON text.
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub ctx: CallContext,
    pub namespace: String,
    pub method: String,
    pub params: Vec<Box<RawValue>>,
}

impl RpcCall {
    #[must_use]
    pub fn new(
        ctx: CallContext,
        namespace: impl Into<String>,
        method: impl Into<String>,
        params: Vec<Box<RawValue>>,
    ) -> Self {
        Self {
            ctx,
            namespace: namespace.into(),
            method: method.into(),
            params,
        }
    }

    /// The method name as the caller wrote it, e.g. `arbtrace_call`.
    #[must_use]
    pub fn full_method(&self) -> String {
        join_method(&self.namespace, &self.method)
    }
}


// ---------------------------------------------------------------------------
// RpcError
// ---------------------------------------------------------------------------

/// Errors returned by the pipeline, router, and handlers.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Unknown method, or a namespace whose redirect is disabled.
    #[error("method not found: {method}")]
    MethodNotFound { method: String },
    /// The redirect endpoint could not be reached.
    #[error("could not connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    /// Application error from the redirect endpoint, passed through verbatim.
    #[error("remote error: {0}")]
    Remote(ErrorObject),
    /// Application error from a local handler, passed through verbatim.
    #[error("handler error: {0}")]
    Local(ErrorObject),
    #[error("call cancelled")]
    Cancelled,
    #[error("call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// The redirect connection closed while the call was pending.
    #[error("redirect connection closed")]
    Closed,
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RpcError {
    /// The error object sent to the caller.
    ///
    /// Transport failures towards a redirect endpoint collapse into a generic
    /// internal error so responses never reveal that forwarding took place.
    #[must_use]
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            Self::MethodNotFound { method } => ErrorObject::method_not_found(method),
            Self::Remote(obj) | Self::Local(obj) => obj.clone(),
            Self::Cancelled => ErrorObject::cancelled(),
            Self::Timeout { timeout_ms } => ErrorObject::timed_out(*timeout_ms),
            Self::Overloaded => ErrorObject::overloaded(),
            Self::InvalidParams(detail) => ErrorObject::invalid_params(detail),
            Self::InvalidRequest(detail) => ErrorObject::invalid_request(detail),
            Self::Connect { .. } | Self::Closed | Self::Internal(_) => ErrorObject::internal(),
        }
    }

    /// Short label used for the `outcome` metric label and log field.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::Connect { .. } => "connect_error",
            Self::Remote(_) | Self::Local(_) => "error_response",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::Closed => "closed",
            Self::Overloaded => "overloaded",
            Self::InvalidParams(_) | Self::InvalidRequest(_) => "invalid",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<ForwardError> for RpcError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Connect { endpoint, reason } => Self::Connect { endpoint, reason },
            ForwardError::Remote(obj) => Self::Remote(obj),
            ForwardError::Cancelled => Self::Cancelled,
            ForwardError::Closed => Self::Closed,
            ForwardError::Encode(detail) => {
                Self::Internal(anyhow::anyhow!("failed to encode forwarded call: {detail}"))
            }
        }
    }
}

/// Errors from turning a JSON-RPC request into an [`RpcCall`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifyError {
    /// The method name has no namespace separator or an empty part.
    #[error("malformed method name: {0}")]
    MalformedMethod(String),
    /// Params were present but not a positional array.
    #[error("{0}")]
    InvalidParams(ErrorObject),
}

impl ClassifyError {
    #[must_use]
    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            Self::MalformedMethod(method) => ErrorObject::method_not_found(method),
            Self::InvalidParams(obj) => obj.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
