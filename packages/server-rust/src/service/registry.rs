use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::config::ServerConfig;

/// Context handed to services when the node starts.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

/// A component with a start/stop lifecycle owned by the node.
///
/// Services start in registration order and stop in reverse, so something
/// registered early (the redirect set) outlives everything that depends on
/// it.
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Unique name, used in logs and for lookup (e.g. `"redirect"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Stops the service. With `terminate`, skip anything slow.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

/// Ordered set of the node's managed services.
///
/// Services are usually shared with the request path too (the router reads
/// the redirect set on every call), so they are held as `Arc`s.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<Vec<Arc<dyn ManagedService>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` and returns a shared handle to it.
    ///
    /// # Errors
    ///
    /// Fails if a service with the same name is already registered.
    pub fn register<T: ManagedService + 'static>(&self, service: T) -> anyhow::Result<Arc<T>> {
        let service = Arc::new(service);
        self.register_shared(Arc::clone(&service))?;
        Ok(service)
    }

    /// Registers a service that is already shared elsewhere.
    ///
    /// # Errors
    ///
    /// Fails if a service with the same name is already registered.
    pub fn register_shared<T: ManagedService + 'static>(&self, service: Arc<T>) -> anyhow::Result<()> {
        let mut services = self.services.write();
        let name = service.name();
        if services.iter().any(|s| s.name() == name) {
            anyhow::bail!("service {name:?} is already registered");
        }
        services.push(service);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.services.read().iter().find(|s| s.name() == name).cloned()
    }

    /// Names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.read().iter().map(|s| s.name()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ManagedService>> {
        self.services.read().clone()
    }

    /// Initializes services in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first `init()` failure; later services are not initialized.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for service in self.snapshot() {
            debug!(service = service.name(), "initializing service");
            service.init(ctx).await?;
        }
        Ok(())
    }

    /// Shuts services down in reverse registration order.
    ///
    /// A failing service does not stop the others from being shut down.
    ///
    /// # Errors
    ///
    /// Returns the first `shutdown()` failure once every service has run.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let mut first_error = None;
        for service in self.snapshot().into_iter().rev() {
            debug!(service = service.name(), terminate, "shutting down service");
            if let Err(e) = service.shutdown(terminate).await {
                warn!(service = service.name(), error = %e, "service shutdown failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        fail_shutdown: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                fail_shutdown: false,
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl ManagedService for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.name));
            Ok(())
        }

        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            self.log.lock().push(format!("shutdown:{}", self.name));
            if self.fail_shutdown {
                anyhow::bail!("{} refused to stop", self.name);
            }
            Ok(())
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext {
            config: Arc::new(ServerConfig::default()),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        let first = registry.register(Recorder::new("redirect", &log)).unwrap();
        assert!(registry.register(Recorder::new("redirect", &log)).is_err());

        assert_eq!(registry.names(), vec!["redirect"]);
        assert_eq!(registry.get("redirect").unwrap().name(), first.name);
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn init_forward_shutdown_reverse() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("redirect", &log)).unwrap();
        registry.register(Recorder::new("metrics", &log)).unwrap();

        registry.init_all(&ctx()).await.unwrap();
        registry.shutdown_all(false).await.unwrap();

        assert_eq!(
            log.lock().clone(),
            vec!["init:redirect", "init:metrics", "shutdown:metrics", "shutdown:redirect"]
        );
    }

    #[tokio::test]
    async fn failing_shutdown_does_not_skip_the_rest() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("redirect", &log)).unwrap();
        registry
            .register(Recorder {
                fail_shutdown: true,
                ..Recorder::new("stubborn", &log)
            })
            .unwrap();

        let err = registry.shutdown_all(false).await.unwrap_err();
        assert!(err.to_string().contains("stubborn refused to stop"));
        assert_eq!(log.lock().clone(), vec!["shutdown:stubborn", "shutdown:redirect"]);
    }
}
