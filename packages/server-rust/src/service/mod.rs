//! From a decoded request to a result.
//!
//! `classify` turns a `JsonRpcRequest` into an `RpcCall`, `middleware` wraps
//! the router in metrics, load shedding and the per-call deadline, and
//! `router` sends each call to its redirect or to a local namespace from
//! `domain`. `registry` owns the start and stop order of long-lived services.

pub mod classify;
pub mod config;
pub mod domain;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod router;

pub use classify::CallClassifier;
pub use config::ServerConfig;
pub use middleware::{build_call_pipeline, CallPipeline};
pub use operation::{CallContext, ClassifyError, RpcCall, RpcError};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use router::{NamespaceRouter, Route, RpcRouter};
