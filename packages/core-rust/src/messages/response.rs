//! JSON-RPC 2.0 response envelope.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::error::ErrorObject;
use super::request::{deserialize_present, RequestId, JSONRPC_VERSION};

/// A JSON-RPC response carrying exactly one of `result` or `error`.
///
/// `result` stays raw JSON text so a forwarded result reaches the caller
/// exactly as the endpoint wrote it. It uses present-but-null decoding so
/// that a successful `null` result is not mistaken for a missing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: RequestId, result: Box<RawValue>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Builds a response from a handler outcome.
    #[must_use]
    pub fn from_outcome(id: RequestId, outcome: Result<Box<RawValue>, ErrorObject>) -> Self {
        match outcome {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    /// Converts the response back into a handler outcome.
    ///
    /// An `error` member wins over `result`. A response with neither is
    /// malformed and reported as an internal error.
    ///
    /// # Errors
    ///
    /// Returns the carried error object, or an internal error for an
    /// envelope with neither member.
    pub fn into_outcome(self) -> Result<Box<RawValue>, ErrorObject> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(ErrorObject::internal()),
        }
    }
}
