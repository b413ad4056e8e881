//! The HTTP listener: binding, routing, serving, and draining.
//!
//! Binding happens in `start()` so the node can report an OS-assigned port
//! before any traffic arrives; `serve()` then runs until the shutdown future
//! resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    health_handler, liveness_handler, readiness_handler, rpc_handler, AppState, RpcServices,
};
use super::middleware::apply_http_layers;
use super::shutdown::ShutdownController;

pub struct NetworkModule {
    config: Arc<NetworkConfig>,
    rpc: RpcServices,
    shutdown: Arc<ShutdownController>,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, rpc: RpcServices) -> Self {
        Self {
            config: Arc::new(config),
            rpc,
            shutdown: Arc::new(ShutdownController::new()),
            listener: None,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// `POST /` takes JSON-RPC requests and batches; `/health`,
    /// `/health/live` and `/health/ready` report node state.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            rpc: self.rpc.clone(),
            config: Arc::clone(&self.config),
            start_time: Instant::now(),
        };

        let routes = Router::new()
            .route("/", post(rpc_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler));
        apply_http_layers(routes, &self.config).with_state(state)
    }

    /// Binds the listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, scheme = self.config.scheme(), "listener bound");
        self.listener = Some(listener);
        Ok(addr.port())
    }

    /// Marks the node ready and serves until `shutdown` resolves.
    ///
    /// Shutdown moves health to `Draining` and gives in-flight requests
    /// `drain_timeout` to finish. Calls still running after that are
    /// cancelled, and health ends at `Stopped` once every request is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, the TLS material
    /// cannot be loaded, or the server hits a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let acceptor = match &self.config.tls {
            Some(tls) => Some(load_tls(tls).await?),
            None => None,
        };
        let router = self.build_router();
        let addr = listener.local_addr()?;
        let listener = listener.into_std()?;

        let handle = Handle::new();
        tokio::spawn(watch_shutdown(
            shutdown,
            Arc::clone(&self.shutdown),
            handle.clone(),
            Arc::clone(&self.config),
        ));

        self.shutdown.set_ready();
        info!(%addr, scheme = self.config.scheme(), "serving JSON-RPC");
        let app = router.into_make_service();
        match acceptor {
            Some(tls) => {
                axum_server::from_tcp_rustls(listener, tls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
            None => axum_server::from_tcp(listener).handle(handle).serve(app).await?,
        }

        self.shutdown.cancel_in_flight();
        if self.shutdown.wait_for_drain(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(in_flight = self.shutdown.in_flight_count(), "requests still in flight at exit");
        }
        Ok(())
    }
}

async fn load_tls(tls: &TlsConfig) -> anyhow::Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))
}

/// Waits for the shutdown signal, stops accepting, and cancels calls that
/// outlive the drain window.
async fn watch_shutdown(
    signal: impl Future<Output = ()>,
    ctrl: Arc<ShutdownController>,
    handle: Handle,
    config: Arc<NetworkConfig>,
) {
    signal.await;
    info!(in_flight = ctrl.in_flight_count(), "shutdown requested, draining");
    ctrl.trigger_shutdown();
    handle.graceful_shutdown(Some(config.drain_timeout));

    if !ctrl.wait_for_drain(config.drain_timeout).await {
        warn!(
            in_flight = ctrl.in_flight_count(),
            "drain window expired, cancelling in-flight calls"
        );
        ctrl.cancel_in_flight();
    }
}
