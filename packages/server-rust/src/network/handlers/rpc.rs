//! `POST /` JSON-RPC endpoint: single requests and batches.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::future::join_all;
use relay_core::{parse_payload, JsonRpcRequest, JsonRpcResponse, Payload, RequestId};
use serde_json::value::RawValue;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use super::AppState;

/// Handles one HTTP body carrying a JSON-RPC request or batch.
///
/// Every call of the request shares one cancellation token. It is cancelled
/// when this future is dropped (the client went away) or when shutdown gives
/// up on draining, and redirected calls abandon their pending reply when it
/// fires.
///
/// Notifications run but produce no response entry; a body made only of
/// notifications gets `204 No Content`.
pub async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let _in_flight = state.shutdown.in_flight_guard();
    let cancel = state.shutdown.call_token();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let payload = match parse_payload(&body) {
        Ok(payload) => payload,
        Err(err) => return Json(JsonRpcResponse::failure(RequestId::Null, err)).into_response(),
    };

    match payload {
        Payload::Single(raw) => match execute(&state, &raw, &cancel).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        Payload::Batch(entries) => {
            let responses: Vec<JsonRpcResponse> =
                join_all(entries.iter().map(|raw| execute(&state, raw, &cancel)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect();
            if responses.is_empty() {
                StatusCode::NO_CONTENT.into_response()
            } else {
                Json(responses).into_response()
            }
        }
    }
}

/// Runs one request object through classification and the call pipeline.
/// Returns `None` for notifications.
///
/// The entry stays raw JSON until classification so forwarded arguments and
/// results are never re-encoded.
async fn execute(
    state: &AppState,
    raw: &RawValue,
    cancel: &CancellationToken,
) -> Option<JsonRpcResponse> {
    let request = match JsonRpcRequest::from_raw(raw) {
        Ok(request) => request,
        Err((id, err)) => return Some(JsonRpcResponse::failure(id, err)),
    };

    let outcome = match state.rpc.classifier.classify(&request, cancel.child_token()) {
        Ok(call) => state
            .rpc
            .pipeline
            .handle()
            .oneshot(call)
            .await
            .map_err(|e| e.to_error_object()),
        Err(e) => Err(e.to_error_object()),
    };

    request
        .id
        .map(|id| JsonRpcResponse::from_outcome(id, outcome))
}
