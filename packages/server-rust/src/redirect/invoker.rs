//! Executes redirected calls against a target's shared connection.

use relay_core::join_method;
use serde_json::value::RawValue;
use tracing::{debug, warn};

use super::error::ForwardError;
use super::manager::RedirectManager;
use crate::service::operation::{RpcCall, RpcError};

/// Pass-through executor for redirected calls.
///
/// The method name and argument list go out exactly as the caller supplied
/// them and the remote result comes back untouched. The invoker never looks
/// inside payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardingInvoker;

impl ForwardingInvoker {
    /// Forwards `call` through `manager`, racing the caller's cancellation.
    ///
    /// Cancellation abandons the in-flight call (its late response is
    /// dropped) but leaves the shared connection up for other callers.
    ///
    /// # Errors
    ///
    /// `Connect`, `Remote`, `Cancelled`, or `Closed`, per the outcome of the
    /// forwarded call.
    pub async fn invoke(&self, manager: &RedirectManager, call: RpcCall) -> Result<Box<RawValue>, RpcError> {
        let RpcCall {
            ctx,
            namespace,
            method,
            params,
        } = call;
        let full_method = join_method(&namespace, &method);

        let forwarded = async {
            let conn = manager.connection().await?;
            conn.call(&full_method, params).await
        };

        let outcome = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => Err(ForwardError::Cancelled),
            outcome = forwarded => outcome,
        };

        match &outcome {
            Ok(_) => debug!(call_id = ctx.call_id, method = %full_method, "forwarded call completed"),
            Err(ForwardError::Connect { endpoint, reason }) => warn!(
                call_id = ctx.call_id,
                method = %full_method,
                endpoint = %endpoint,
                reason = %reason,
                "redirect endpoint unreachable"
            ),
            Err(ForwardError::Remote(remote)) => debug!(
                call_id = ctx.call_id,
                method = %full_method,
                code = remote.code,
                "redirect endpoint returned an error"
            ),
            Err(e) => debug!(call_id = ctx.call_id, method = %full_method, error = %e, "forwarded call failed"),
        }

        outcome.map_err(RpcError::from)
    }
}
