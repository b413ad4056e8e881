use crate::redirect::RedirectTarget;

/// Largest redirect response frame accepted by default (trace results for a
/// whole block can be large).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 128 * 1024 * 1024;

/// Server-level configuration for call routing and forwarding.
///
/// Controls call timeouts, concurrency limits, and the redirect targets.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique identifier for this server node.
    pub node_id: String,
    /// Default timeout for calls in milliseconds.
    pub default_call_timeout_ms: u64,
    /// Maximum number of concurrent calls before load shedding.
    pub max_concurrent_calls: u32,
    /// Namespaces forwarded to external endpoints. Fixed once the node starts.
    pub redirects: Vec<RedirectTarget>,
    /// Maximum size of one newline-delimited frame on a redirect connection.
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            default_call_timeout_ms: 30_000,
            max_concurrent_calls: 1000,
            redirects: Vec::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}
