//! Request classification: converts a JSON-RPC request into an `RpcCall`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use relay_core::{JsonRpcRequest, MethodName};
use tokio_util::sync::CancellationToken;

use super::config::ServerConfig;
use super::operation::{CallContext, ClassifyError, RpcCall};

// ---------------------------------------------------------------------------
// CallClassifier
// ---------------------------------------------------------------------------

/// Classifies decoded JSON-RPC requests into [`RpcCall`] values.
///
/// Each call gets a unique call ID, a fresh trace id, and the configured
/// default timeout.
pub struct CallClassifier {
    config: Arc<ServerConfig>,
    call_id_counter: AtomicU64,
}

impl CallClassifier {
    #[must_use]
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Classify `request` into an [`RpcCall`] whose context is cancelled by
    /// `cancel`.
    ///
    /// # Errors
    ///
    /// - `ClassifyError::MalformedMethod` when the method has no namespace
    ///   separator or an empty part
    /// - `ClassifyError::InvalidParams` when params are not a positional array
    pub fn classify(
        &self,
        request: &JsonRpcRequest,
        cancel: CancellationToken,
    ) -> Result<RpcCall, ClassifyError> {
        let name = MethodName::parse(&request.method)
            .ok_or_else(|| ClassifyError::MalformedMethod(request.method.clone()))?;
        let params = request
            .positional_params()
            .map_err(ClassifyError::InvalidParams)?;

        let ctx = CallContext::new(self.next_call_id(), self.config.default_call_timeout_ms)
            .with_cancel(cancel);
        Ok(RpcCall::new(ctx, name.namespace, name.method, params))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
