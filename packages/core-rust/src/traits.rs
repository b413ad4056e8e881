use async_trait::async_trait;
use serde_json::Value;

use crate::messages::ErrorObject;

/// A locally served JSON-RPC namespace.
///
/// The node registers one handler per namespace it serves itself. Calls are
/// delivered with the namespace already stripped from the method name and
/// the params already reduced to an ordered argument list.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// The namespace this handler serves (e.g. `"web3"`).
    fn namespace(&self) -> &'static str;

    /// Handle one call. Unknown methods should return
    /// [`ErrorObject::method_not_found`] with the full method name.
    async fn handle(&self, method: &str, params: Vec<Value>) -> Result<Value, ErrorObject>;
}
