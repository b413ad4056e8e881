//! Node assembly: wires redirects, local namespaces, the call pipeline, and
//! the HTTP module together and runs them through one lifecycle.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::network::{NetworkConfig, NetworkModule, RpcServices, SharedPipeline, ShutdownController};
use crate::redirect::RedirectSet;
use crate::service::domain::{NetHandler, RpcModulesHandler, Web3Handler};
use crate::service::{
    build_call_pipeline, CallClassifier, NamespaceRouter, RpcRouter, ServerConfig, ServiceContext,
    ServiceRegistry,
};

/// A runnable relay node.
///
/// Construction validates configuration and builds everything without
/// touching the network. `start()` initializes services and binds the
/// listener; `run()` serves until the shutdown future resolves and then
/// shuts services down in reverse registration order, which closes every
/// redirect connection.
pub struct RelayNode {
    config: Arc<ServerConfig>,
    registry: ServiceRegistry,
    redirects: Arc<RedirectSet>,
    network: NetworkModule,
}

impl RelayNode {
    /// Builds a node from its server and network configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a redirect target is invalid or a namespace is
    /// redirected twice.
    pub fn new(server: ServerConfig, network: NetworkConfig) -> anyhow::Result<Self> {
        let config = Arc::new(server);
        let redirects = Arc::new(RedirectSet::new(&config.redirects, config.max_frame_bytes)?);

        let registry = ServiceRegistry::new();
        registry.register_shared(Arc::clone(&redirects))?;

        let mut router = RpcRouter::new(NamespaceRouter::new(Arc::clone(&redirects)));
        router.register(Web3Handler::default());
        router.register(NetHandler);
        router.register(RpcModulesHandler::new(router.served_namespaces()));

        let rpc = RpcServices {
            pipeline: SharedPipeline::new(build_call_pipeline(router, &config)),
            classifier: Arc::new(CallClassifier::new(Arc::clone(&config))),
            redirects: Arc::clone(&redirects),
        };

        Ok(Self {
            config,
            registry,
            redirects,
            network: NetworkModule::new(network, rpc),
        })
    }

    #[must_use]
    pub fn redirects(&self) -> &Arc<RedirectSet> {
        &self.redirects
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        self.network.shutdown_controller()
    }

    /// Initializes services and binds the HTTP listener.
    ///
    /// Returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if a service fails to initialize or the address
    /// cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let ctx = ServiceContext {
            config: Arc::clone(&self.config),
        };
        self.registry.init_all(&ctx).await?;
        let port = self.network.start().await?;
        info!(
            node_id = %self.config.node_id,
            port,
            redirects = ?self.redirects.namespaces(),
            "relay node started"
        );
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains HTTP and shuts services
    /// down. Service shutdown failures are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let served = self.network.serve(shutdown).await;

        if let Err(e) = self.registry.shutdown_all(false).await {
            warn!(error = %e, "service shutdown reported an error");
        }
        info!("relay node stopped");
        served
    }
}
