//! Namespace redirection to an external JSON-RPC endpoint.
//!
//! Calls under a redirected namespace (by default `arbtrace`) are forwarded
//! over a single lazily-dialed, newline-delimited JSON-RPC connection:
//!
//! 1. **Target** (`target`): namespace, endpoint address, connect timeout
//! 2. **Connection** (`connection`): multiplexed request/response over one socket
//! 3. **Manager** (`manager`): single-winner dial, reuse, redial, close
//! 4. **Invoker** (`invoker`): pass-through execution with cancellation
//! 5. **Set** (`set`): every redirect of a node, as a managed service

pub mod connection;
pub mod error;
pub mod invoker;
pub mod manager;
pub mod set;
pub mod target;

pub use connection::RedirectConnection;
pub use error::ForwardError;
pub use invoker::ForwardingInvoker;
pub use manager::{ManagerState, RedirectManager};
pub use set::{RedirectSet, RedirectStatus};
pub use target::{
    Endpoint, RedirectTarget, TargetError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REDIRECT_NAMESPACE,
};
