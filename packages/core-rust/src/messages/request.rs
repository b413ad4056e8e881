//! JSON-RPC 2.0 request envelope.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::{to_raw_value, RawValue};

use super::error::ErrorObject;

/// The protocol version string every envelope must carry.
pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Present-but-null helper
// ---------------------------------------------------------------------------

/// Deserializes a field where "absent" and "present with null" differ.
///
/// Used together with `#[serde(default)]`: an absent field stays `None`,
/// while `null` reaches the inner type's deserializer and becomes `Some(..)`.
/// For request ids this separates notifications (no id) from `"id": null`.
pub(crate) fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// RequestId
// ---------------------------------------------------------------------------

/// A request identifier. JSON-RPC allows numbers, strings, and null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
    Null,
}

impl RequestId {
    /// Returns the id as an unsigned integer when it is one.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id.into())
    }
}

// ---------------------------------------------------------------------------
// JsonRpcRequest
// ---------------------------------------------------------------------------

/// A single JSON-RPC request or notification.
///
/// `params` is kept as raw JSON text. Arguments of a forwarded call are
/// written out exactly as the caller sent them, so large integers and
/// number spellings like `1.10` survive the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    /// `None` marks a notification: it runs, but gets no response.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<RawValue>>,
}

/// Just the id of a request object, read before the full decode so that a
/// malformed request can still be answered under its own id.
#[derive(Deserialize)]
struct IdOnly {
    #[serde(default, deserialize_with = "deserialize_present")]
    id: Option<RequestId>,
}

impl JsonRpcRequest {
    /// Builds a request with positional params, as sent on the redirect channel.
    ///
    /// # Errors
    ///
    /// Fails only if the argument list cannot be encoded.
    pub fn new(
        id: impl Into<RequestId>,
        method: impl Into<String>,
        params: &[Box<RawValue>],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params: Some(to_raw_value(params)?),
        })
    }

    /// Decodes one request from a raw batch entry or body.
    ///
    /// On failure the error comes back with whatever id could be salvaged
    /// from the entry, so the caller can still address the error response.
    ///
    /// # Errors
    ///
    /// Returns an `invalid request` error object when the entry is not a
    /// request object or carries the wrong protocol version.
    pub fn from_raw(raw: &RawValue) -> Result<Self, (RequestId, ErrorObject)> {
        let salvaged_id = serde_json::from_str::<IdOnly>(raw.get())
            .ok()
            .and_then(|only| only.id)
            .unwrap_or(RequestId::Null);

        let request: Self = serde_json::from_str(raw.get())
            .map_err(|e| (salvaged_id.clone(), ErrorObject::invalid_request(e)))?;

        if request.jsonrpc != JSONRPC_VERSION {
            return Err((
                salvaged_id,
                ErrorObject::invalid_request(format!(
                    "unsupported jsonrpc version {:?}",
                    request.jsonrpc
                )),
            ));
        }
        Ok(request)
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Returns the params as an ordered list of raw arguments.
    ///
    /// Absent or `null` params mean "no arguments". Named (object) params
    /// have no ordering and are rejected.
    ///
    /// # Errors
    ///
    /// Returns an `invalid params` error object for object or scalar params.
    pub fn positional_params(&self) -> Result<Vec<Box<RawValue>>, ErrorObject> {
        let Some(params) = &self.params else {
            return Ok(Vec::new());
        };
        let text = params.get().trim_start();
        if text.starts_with('[') {
            serde_json::from_str(text).map_err(ErrorObject::invalid_params)
        } else if text.starts_with('{') {
            Err(ErrorObject::invalid_params(
                "named parameters are not supported",
            ))
        } else if text == "null" {
            Ok(Vec::new())
        } else {
            Err(ErrorObject::invalid_params("params must be an array"))
        }
    }
}
