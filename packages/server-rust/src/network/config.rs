//! Listener settings for the relay's HTTP JSON-RPC endpoint.

use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on one HTTP exchange; a batch of slow traces shares it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest JSON-RPC request body accepted.
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Grace period for in-flight calls once shutdown starts.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick a port; [`NetworkModule::start`] reports the
    /// bound one.
    ///
    /// [`NetworkModule::start`]: super::NetworkModule::start
    pub port: u16,
    /// Serve HTTPS instead of plain HTTP when set.
    pub tls: Option<TlsConfig>,
    /// Origins allowed by CORS. `"*"` allows any.
    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    /// How long in-flight calls may keep running after shutdown starts
    /// before they are cancelled.
    pub drain_timeout: Duration,
}

impl NetworkConfig {
    /// `host:port` as handed to the listener.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            cors_origins: vec!["*".to_string()],
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}
