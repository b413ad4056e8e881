use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::manager::{ManagerState, RedirectManager};
use super::target::{RedirectTarget, TargetError};
use crate::service::registry::{ManagedService, ServiceContext};

/// Point-in-time view of one redirect, reported by the health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectStatus {
    pub namespace: String,
    pub endpoint: String,
    pub state: &'static str,
    pub dials: u64,
}

// ---------------------------------------------------------------------------
// RedirectSet
// ---------------------------------------------------------------------------

/// All enabled redirects of one node, keyed by namespace.
///
/// Disabled targets (blank endpoint) are validated and then dropped, so a
/// namespace that is not in the set is simply not redirected.
#[derive(Debug, Default)]
pub struct RedirectSet {
    managers: HashMap<String, Arc<RedirectManager>>,
}

impl RedirectSet {
    /// Builds managers for every enabled target. Nothing is dialed yet.
    ///
    /// # Errors
    ///
    /// Returns `TargetError` if any target fails validation or a namespace
    /// appears twice, whether or not the duplicates are enabled.
    pub fn new(targets: &[RedirectTarget], max_frame_bytes: usize) -> Result<Self, TargetError> {
        let mut seen = HashSet::new();
        let mut managers = HashMap::new();
        for target in targets {
            target.validate()?;
            if !seen.insert(target.namespace.as_str()) {
                return Err(TargetError::Duplicate(target.namespace.clone()));
            }
            if !target.is_enabled() {
                info!(namespace = %target.namespace, "redirect disabled: no endpoint configured");
                continue;
            }
            let manager = RedirectManager::new(target.clone(), max_frame_bytes)?;
            managers.insert(target.namespace.clone(), Arc::new(manager));
        }
        Ok(Self { managers })
    }

    /// Returns the manager for `namespace` if it is redirected.
    #[must_use]
    pub fn manager(&self, namespace: &str) -> Option<&Arc<RedirectManager>> {
        self.managers.get(namespace)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Redirected namespaces in sorted order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.managers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Current state of every redirect, sorted by namespace.
    #[must_use]
    pub fn statuses(&self) -> Vec<RedirectStatus> {
        self.namespaces()
            .into_iter()
            .filter_map(|ns| self.managers.get(ns))
            .map(|m| RedirectStatus {
                namespace: m.target().namespace.clone(),
                endpoint: m.endpoint().to_string(),
                state: m.state().as_str(),
                dials: m.dial_count(),
            })
            .collect()
    }

    /// Whether any redirect has been shut down.
    #[must_use]
    pub fn any_closed(&self) -> bool {
        self.managers
            .values()
            .any(|m| m.state() == ManagerState::Closed)
    }

    /// Closes every manager. Idempotent.
    pub async fn close_all(&self) {
        for manager in self.managers.values() {
            manager.close().await;
        }
    }
}

#[async_trait]
impl ManagedService for RedirectSet {
    fn name(&self) -> &'static str {
        "redirect"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        for status in self.statuses() {
            info!(namespace = %status.namespace, endpoint = %status.endpoint, "redirect configured");
        }
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        self.close_all().await;
        Ok(())
    }
}
