//! classic-relay core -- JSON-RPC envelopes, error objects, method names, and
//! the local handler trait shared by the node and its tests.

pub mod messages;
pub mod method;
pub mod traits;

pub use messages::{
    codes, parse_payload, ErrorObject, JsonRpcRequest, JsonRpcResponse, Payload, RequestId,
};
pub use method::{is_valid_namespace, join_method, MethodName};
pub use traits::RpcHandler;
