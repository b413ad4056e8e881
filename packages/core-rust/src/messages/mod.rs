//! JSON-RPC 2.0 wire types.
//!
//! The relay speaks plain JSON-RPC 2.0 on both sides: HTTP bodies from
//! callers, and newline-delimited objects on the redirect channel.

pub mod error;
pub mod request;
pub mod response;

pub use error::{codes, ErrorObject};
pub use request::{JsonRpcRequest, RequestId, JSONRPC_VERSION};
pub use response::JsonRpcResponse;

use serde_json::value::RawValue;

/// A decoded HTTP body: one call or a batch of them.
///
/// Entries stay as raw JSON text. A malformed entry in a batch produces one
/// error response instead of failing the whole batch, and arguments that
/// are forwarded elsewhere are never re-encoded.
#[derive(Debug, Clone)]
pub enum Payload {
    Single(Box<RawValue>),
    Batch(Vec<Box<RawValue>>),
}

/// Parses a request body into a [`Payload`].
///
/// # Errors
///
/// Returns a `parse error` object for invalid JSON and an `invalid request`
/// object for an empty batch.
pub fn parse_payload(body: &[u8]) -> Result<Payload, ErrorObject> {
    let parse_error = |e: serde_json::Error| {
        tracing::debug!(error = %e, "rejecting malformed JSON-RPC body");
        ErrorObject::parse_error(e)
    };
    let raw: &RawValue = serde_json::from_slice(body).map_err(parse_error)?;

    if !raw.get().starts_with('[') {
        return Ok(Payload::Single(raw.to_owned()));
    }
    let entries: Vec<Box<RawValue>> = serde_json::from_str(raw.get()).map_err(parse_error)?;
    if entries.is_empty() {
        return Err(ErrorObject::invalid_request("empty batch"));
    }
    Ok(Payload::Batch(entries))
}
