//! JSON-RPC 2.0 error objects and the error codes used by the relay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes carried in [`ErrorObject::code`].
///
/// The `-32700..=-32600` range is reserved by JSON-RPC 2.0. The remaining
/// codes sit in the implementation-defined server error range.
pub mod codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The server refused the call because it is at its concurrency limit.
    pub const SERVER_OVERLOADED: i64 = -32005;
    /// The caller gave up before the call completed.
    pub const REQUEST_CANCELLED: i64 = -32800;
    /// The call exceeded its deadline.
    pub const REQUEST_TIMED_OUT: i64 = -32801;
}

/// A JSON-RPC error object: `{"code": .., "message": .., "data": ..}`.
///
/// Remote errors are carried through the relay as-is, so the `data` member
/// is kept as an opaque value and only serialized when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach a `data` member to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("parse error: {detail}"))
    }

    #[must_use]
    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("invalid request: {detail}"))
    }

    /// The error returned for unknown methods and for namespaces whose
    /// redirect is disabled. Both must look identical to the caller.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("the method {method} does not exist/is not available"),
        )
    }

    #[must_use]
    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("invalid params: {detail}"))
    }

    /// Generic internal error. Deliberately carries no detail so transport
    /// failures behind the node never show up in responses.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(codes::INTERNAL_ERROR, "internal error")
    }

    #[must_use]
    pub fn overloaded() -> Self {
        Self::new(codes::SERVER_OVERLOADED, "server overloaded, try again later")
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(codes::REQUEST_CANCELLED, "request cancelled")
    }

    #[must_use]
    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::new(
            codes::REQUEST_TIMED_OUT,
            format!("request timed out after {timeout_ms}ms"),
        )
    }
}
