//! Locally served namespaces.
//!
//! The node answers a few introspection methods itself so that clients and
//! health probes can talk to it without involving any redirect target.

use std::collections::BTreeMap;

use async_trait::async_trait;
use relay_core::{join_method, ErrorObject, RpcHandler};
use serde_json::{json, Value};

/// Name reported by `web3_clientVersion`.
pub const CLIENT_NAME: &str = "classic-relay";

/// Version string reported for every namespace by `rpc_modules`.
pub const MODULE_VERSION: &str = "1.0";

fn unknown(namespace: &str, method: &str) -> ErrorObject {
    ErrorObject::method_not_found(&join_method(namespace, method))
}

// ---------------------------------------------------------------------------
// web3
// ---------------------------------------------------------------------------

/// `web3_*`: client identification.
#[derive(Debug, Clone)]
pub struct Web3Handler {
    client_version: String,
}

impl Web3Handler {
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self {
            client_version: format!("{CLIENT_NAME}/{version}"),
        }
    }
}

impl Default for Web3Handler {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl RpcHandler for Web3Handler {
    fn namespace(&self) -> &'static str {
        "web3"
    }

    async fn handle(&self, method: &str, _params: Vec<Value>) -> Result<Value, ErrorObject> {
        match method {
            "clientVersion" => Ok(Value::String(self.client_version.clone())),
            _ => Err(unknown(self.namespace(), method)),
        }
    }
}

// ---------------------------------------------------------------------------
// net
// ---------------------------------------------------------------------------

/// `net_*`: listener status.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetHandler;

#[async_trait]
impl RpcHandler for NetHandler {
    fn namespace(&self) -> &'static str {
        "net"
    }

    async fn handle(&self, method: &str, _params: Vec<Value>) -> Result<Value, ErrorObject> {
        match method {
            "listening" => Ok(Value::Bool(true)),
            _ => Err(unknown(self.namespace(), method)),
        }
    }
}

// ---------------------------------------------------------------------------
// rpc
// ---------------------------------------------------------------------------

/// `rpc_modules`: every namespace the node answers for, redirected ones
/// included, so callers cannot tell them apart.
#[derive(Debug, Clone)]
pub struct RpcModulesHandler {
    modules: BTreeMap<String, &'static str>,
}

impl RpcModulesHandler {
    /// `namespaces` should list everything served besides `rpc` itself.
    #[must_use]
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut modules: BTreeMap<String, &'static str> = namespaces
            .into_iter()
            .map(|ns| (ns.into(), MODULE_VERSION))
            .collect();
        modules.insert("rpc".to_string(), MODULE_VERSION);
        Self { modules }
    }
}

#[async_trait]
impl RpcHandler for RpcModulesHandler {
    fn namespace(&self) -> &'static str {
        "rpc"
    }

    async fn handle(&self, method: &str, _params: Vec<Value>) -> Result<Value, ErrorObject> {
        match method {
            "modules" => Ok(json!(self.modules)),
            _ => Err(unknown(self.namespace(), method)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
