//! `classic-relay` -- JSON-RPC node that forwards a legacy trace namespace
//! to a classic node.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use relay_server::network::{NetworkConfig, TlsConfig};
use relay_server::redirect::{RedirectTarget, DEFAULT_REDIRECT_NAMESPACE};
use relay_server::telemetry::{init_tracing, install_metrics_exporter, LogFormat};
use relay_server::{RelayNode, ServerConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "classic-relay", version, about = "JSON-RPC relay with classic namespace redirection", long_about = None)]
struct Args {
    /// Address the HTTP JSON-RPC server binds to
    #[arg(long = "http.addr", env = "RELAY_HTTP_ADDR", default_value = "127.0.0.1")]
    http_addr: String,

    /// Port the HTTP JSON-RPC server listens on
    #[arg(long = "http.port", env = "RELAY_HTTP_PORT", default_value_t = 8547)]
    http_port: u16,

    /// Classic node endpoint (IPC socket path or host:port); empty disables redirection
    #[arg(long = "classic-redirect", env = "RELAY_CLASSIC_REDIRECT", default_value = "")]
    classic_redirect: String,

    /// Timeout for connecting to the classic node, in milliseconds
    #[arg(
        long = "classic-redirect-timeout-ms",
        env = "RELAY_CLASSIC_REDIRECT_TIMEOUT_MS",
        default_value_t = 1000
    )]
    classic_redirect_timeout_ms: u64,

    /// Namespace whose calls are forwarded to the classic node
    #[arg(
        long = "classic-redirect-namespace",
        env = "RELAY_CLASSIC_REDIRECT_NAMESPACE",
        default_value = DEFAULT_REDIRECT_NAMESPACE
    )]
    classic_redirect_namespace: String,

    /// Per-call timeout, in milliseconds
    #[arg(long, env = "RELAY_CALL_TIMEOUT_MS", default_value_t = 30_000)]
    call_timeout_ms: u64,

    /// Calls allowed to run at once before new ones are rejected
    #[arg(long, env = "RELAY_MAX_CONCURRENT_CALLS", default_value_t = 1000)]
    max_concurrent_calls: u32,

    /// How long in-flight calls may run after shutdown starts, in milliseconds
    #[arg(long, env = "RELAY_DRAIN_TIMEOUT_MS", default_value_t = 10_000)]
    drain_timeout_ms: u64,

    /// Log output format: text or json
    #[arg(long, env = "RELAY_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Address for the Prometheus scrape endpoint; disabled when unset
    #[arg(long, env = "RELAY_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// PEM certificate chain; serves HTTPS together with --tls-key
    #[arg(long, env = "RELAY_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, env = "RELAY_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Identifier reported in logs
    #[arg(long, env = "RELAY_NODE_ID", default_value = "classic-relay")]
    node_id: String,
}

impl Args {
    fn into_configs(self) -> (ServerConfig, NetworkConfig) {
        let redirect = RedirectTarget::new(
            self.classic_redirect_namespace,
            self.classic_redirect,
            Duration::from_millis(self.classic_redirect_timeout_ms),
        );
        let server = ServerConfig {
            node_id: self.node_id,
            default_call_timeout_ms: self.call_timeout_ms,
            max_concurrent_calls: self.max_concurrent_calls,
            redirects: vec![redirect],
            ..ServerConfig::default()
        };
        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            _ => None,
        };
        let network = NetworkConfig {
            host: self.http_addr,
            port: self.http_port,
            tls,
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
            ..NetworkConfig::default()
        };
        (server, network)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;

    if let Some(addr) = args.metrics_addr {
        install_metrics_exporter(addr)?;
    }

    let (server, network) = args.into_configs();
    let mut node = RelayNode::new(server, network)?;
    let port = node.start().await?;
    info!(port, "accepting JSON-RPC requests");

    node.run(shutdown_signal()).await
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C"),
        () = terminate => info!("received SIGTERM"),
    }
}
