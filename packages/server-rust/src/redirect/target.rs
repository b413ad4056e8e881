//! Forwarding target descriptors and endpoint address parsing.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use relay_core::is_valid_namespace;

/// Namespace redirected to the classic node when none is configured.
pub const DEFAULT_REDIRECT_NAMESPACE: &str = "arbtrace";

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// RedirectTarget
// ---------------------------------------------------------------------------

/// Where one namespace's calls are forwarded to.
///
/// An empty `endpoint` keeps the target configured but disabled: calls under
/// its namespace then fail exactly like calls to an unknown method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Method prefix being redirected (e.g. `arbtrace`).
    pub namespace: String,
    /// IPC socket path, `unix://<path>`, `tcp://host:port`, or `host:port`.
    pub endpoint: String,
    /// Upper bound on connection establishment.
    pub connect_timeout: Duration,
}

impl RedirectTarget {
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        endpoint: impl Into<String>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            endpoint: endpoint.into(),
            connect_timeout,
        }
    }

    /// Whether calls under this namespace should be forwarded at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    /// Checks the namespace and, for enabled targets, the endpoint address.
    ///
    /// # Errors
    ///
    /// Returns `TargetError` for an unusable namespace, a zero connect
    /// timeout, or an endpoint that does not parse.
    pub fn validate(&self) -> Result<(), TargetError> {
        if !is_valid_namespace(&self.namespace) {
            return Err(TargetError::Namespace(self.namespace.clone()));
        }
        if !self.is_enabled() {
            return Ok(());
        }
        if self.connect_timeout.is_zero() {
            return Err(TargetError::ZeroTimeout(self.namespace.clone()));
        }
        Endpoint::parse(&self.endpoint)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// A parsed redirect endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix domain socket (the classic node's IPC endpoint).
    Ipc(PathBuf),
    /// TCP `host:port`.
    Tcp(String),
}

impl Endpoint {
    /// Parses an endpoint address.
    ///
    /// Anything that looks like a path (contains `/` or ends in `.ipc`) is an
    /// IPC socket; `host:port` is TCP. Schemes other than `unix://` and
    /// `tcp://` are rejected.
    ///
    /// # Errors
    ///
    /// Returns `TargetError::Endpoint` when the address matches no form.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let raw = raw.trim();
        let invalid = |reason: &str| TargetError::Endpoint {
            endpoint: raw.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = raw.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(Self::Ipc(PathBuf::from(path)));
        }
        if let Some(addr) = raw.strip_prefix("tcp://") {
            return Self::parse_host_port(addr).ok_or_else(|| invalid("expected host:port"));
        }
        if raw.contains("://") {
            return Err(invalid("unsupported scheme"));
        }
        if raw.contains('/') || raw.ends_with(".ipc") {
            return Ok(Self::Ipc(PathBuf::from(raw)));
        }
        Self::parse_host_port(raw).ok_or_else(|| invalid("expected a socket path or host:port"))
    }

    fn parse_host_port(addr: &str) -> Option<Self> {
        let (host, port) = addr.rsplit_once(':')?;
        if host.is_empty() || port.parse::<u16>().is_err() {
            return None;
        }
        Some(Self::Tcp(addr.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipc(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// Configuration errors for redirect targets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("invalid redirect namespace {0:?}")]
    Namespace(String),
    #[error("redirect for namespace {0:?} has a zero connect timeout")]
    ZeroTimeout(String),
    #[error("invalid redirect endpoint {endpoint:?}: {reason}")]
    Endpoint { endpoint: String, reason: String },
    #[error("namespace {0:?} is redirected more than once")]
    Duplicate(String),
}
