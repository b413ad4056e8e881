//! Readiness polling against a JSON-RPC endpoint, used by `health-probe`.

use std::time::Duration;

use relay_core::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

/// Result of [`wait_until_ready`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The method returned a result; carries it and the attempt count.
    Ready { result: Value, attempts: u32 },
    /// The deadline passed first; carries the last failure seen.
    DeadlineExpired { attempts: u32, last_error: String },
}

/// Calls `method` once and returns its result.
///
/// # Errors
///
/// Returns a description of the transport failure, HTTP status, or
/// JSON-RPC error that prevented a result.
pub async fn call_once(
    client: &reqwest::Client,
    url: &str,
    method: &str,
) -> Result<Value, String> {
    let request = JsonRpcRequest::new(1, method, &[])
        .map_err(|e| format!("cannot encode request: {e}"))?;
    let response = client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    let envelope: JsonRpcResponse = response
        .json()
        .await
        .map_err(|e| format!("invalid response body: {e}"))?;
    let result = envelope.into_outcome().map_err(|e| e.to_string())?;
    serde_json::from_str(result.get()).map_err(|e| format!("invalid result: {e}"))
}

/// Polls `method` every `interval` until it returns a result or `deadline`
/// has passed. An attempt never runs past the deadline.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    interval: Duration,
    deadline: Duration,
) -> ProbeOutcome {
    let give_up_at = Instant::now() + deadline;
    let mut attempts = 0;
    let mut last_error = String::from("no attempt made");

    loop {
        let remaining = give_up_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeOutcome::DeadlineExpired {
                attempts,
                last_error,
            };
        }

        attempts += 1;
        match tokio::time::timeout(remaining, call_once(client, url, method)).await {
            Ok(Ok(result)) => return ProbeOutcome::Ready { result, attempts },
            Ok(Err(e)) => last_error = e,
            Err(_elapsed) => last_error = String::from("attempt timed out"),
        }
        debug!(attempts, error = %last_error, "endpoint not ready yet");

        let pause = interval.min(give_up_at.saturating_duration_since(Instant::now()));
        tokio::time::sleep(pause).await;
    }
}
