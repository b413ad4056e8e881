use relay_core::ErrorObject;

/// Failure of one forwarded call, as seen by the redirect layer.
///
/// `Clone` because a single dial outcome is shared by every caller that
/// waited on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForwardError {
    /// The endpoint could not be reached within the connect timeout.
    #[error("could not connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    /// The endpoint answered with an application error.
    #[error("remote error: {0}")]
    Remote(ErrorObject),
    /// The caller gave up before the endpoint answered.
    #[error("call cancelled by caller")]
    Cancelled,
    /// The connection went away while the call was pending, or the manager
    /// has been shut down.
    #[error("redirect connection closed")]
    Closed,
    /// The outbound request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),
}
