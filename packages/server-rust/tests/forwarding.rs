//! End-to-end tests: HTTP JSON-RPC in, classic node over IPC out.

#![cfg(unix)]

mod common;

use std::time::{Duration, Instant};

use common::{missing_trie_node, ClassicStub, TestRelay};
use futures_util::future::join_all;
use relay_core::codes;
use relay_server::redirect::ManagerState;
use serde_json::{json, Value};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(300);

async fn relay_for(stub: &ClassicStub) -> TestRelay {
    TestRelay::start(&stub.endpoint(), CONNECT_TIMEOUT, 5_000).await
}

#[tokio::test]
async fn trace_methods_reach_the_classic_node_once_and_verbatim() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let tx = "0x3e1b3f5e0d6f1c2b5ad1c0a58f0e1b2c3d4e5f60718293a4b5c6d7e8f9a0b1c2";
    let call = json!({
        "from": "0x00000000000000000000000000000000000000aa",
        "to": "0x0000000000000000000000000000000000000064",
        "gas": "0x5208",
        "value": "0x0",
        "data": "0xa9059cbb"
    });
    let cases = [
        ("arbtrace_call", json!([call, ["trace"], "0x10"])),
        (
            "arbtrace_callMany",
            json!([[[call, ["trace"]], [{"to": "0x0000000000000000000000000000000000000065"}, ["trace", "stateDiff"]]], "latest"]),
        ),
        ("arbtrace_replayBlockTransactions", json!(["0x2a", ["trace"]])),
        ("arbtrace_replayTransaction", json!([tx, ["trace", "vmTrace"]])),
        ("arbtrace_transaction", json!([tx])),
        ("arbtrace_get", json!([tx, ["0x0", "0x1"]])),
        ("arbtrace_block", json!(["0x2a"])),
        (
            "arbtrace_filter",
            json!([{"fromBlock": "0x1", "toBlock": "0x2", "fromAddress": ["0x00000000000000000000000000000000000000aa"], "after": 0, "count": 10}]),
        ),
    ];

    for (method, params) in &cases {
        let response = relay.call(method, params.clone()).await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 1, "result": []}));
    }

    let expected: Vec<(String, String)> = cases
        .iter()
        .map(|(m, p)| ((*m).to_string(), serde_json::to_string(p).unwrap()))
        .collect();
    assert_eq!(stub.raw_calls(), expected);
    assert_eq!(stub.connections(), 1);

    relay.stop().await;
}

#[tokio::test]
async fn numbers_reach_the_classic_node_with_their_exact_spelling() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let body = relay
        .post_text(
            r#"{"jsonrpc":"2.0","id":1,"method":"arbtrace_block","params":[123456789012345678901234567890, 1.10]}"#,
        )
        .await;
    assert_eq!(body, r#"{"jsonrpc":"2.0","id":1,"result":[]}"#);
    assert_eq!(
        stub.raw_calls(),
        vec![(
            "arbtrace_block".to_string(),
            "[123456789012345678901234567890,1.10]".to_string()
        )]
    );

    // Results come back just as untouched.
    let body = relay
        .post_text(
            r#"{"jsonrpc":"2.0","id":2,"method":"arbtrace_echo","params":[18446744073709551616,-0,1e3,"\u00e9"]}"#,
        )
        .await;
    assert_eq!(
        body,
        r#"{"jsonrpc":"2.0","id":2,"result":[18446744073709551616,-0,1e3,"\u00e9"]}"#
    );

    relay.stop().await;
}

#[tokio::test]
async fn any_configured_namespace_can_be_redirected() {
    let stub = ClassicStub::start().await;
    let relay =
        TestRelay::start_redirecting("legacyTrace", &stub.endpoint(), CONNECT_TIMEOUT, 5_000).await;

    for (method, params) in [
        ("legacyTrace_call", json!([{"to": "0x01"}, ["trace"], "latest"])),
        ("legacyTrace_block", json!(["0x2a"])),
        ("legacyTrace_filter", json!([{"fromBlock": "0x1"}])),
    ] {
        let response = relay.call(method, params).await;
        assert_eq!(response["result"], json!([]));
        assert!(response.get("error").is_none());
    }

    let methods: Vec<String> = stub.calls().into_iter().map(|(m, _)| m).collect();
    assert_eq!(methods, ["legacyTrace_call", "legacyTrace_block", "legacyTrace_filter"]);

    // The default namespace is not redirected when another one is configured.
    let response = relay.call("arbtrace_block", json!(["0x2a"])).await;
    assert_eq!(response["error"]["code"], codes::METHOD_NOT_FOUND);

    relay.stop().await;
}

#[tokio::test]
async fn remote_errors_pass_through_unchanged() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let response = relay.call("arbtrace_fail", json!(["0x1"])).await;
    assert_eq!(
        response["error"],
        serde_json::to_value(missing_trie_node()).unwrap()
    );
    assert_eq!(response["id"], 1);

    relay.stop().await;
}

#[tokio::test]
async fn unreachable_classic_node_fails_after_connect_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nobody-listens.ipc");
    let relay = TestRelay::start(&missing.display().to_string(), CONNECT_TIMEOUT, 5_000).await;

    let started = Instant::now();
    let response = relay.call("arbtrace_block", json!(["latest"])).await;
    let elapsed = started.elapsed();

    assert_eq!(response["error"]["code"], codes::INTERNAL_ERROR);
    assert_eq!(response["error"]["message"], "internal error");
    assert!(elapsed >= Duration::from_millis(250), "failed too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "failed too late: {elapsed:?}");

    // A failed dial is not cached: the next call dials again.
    relay.call("arbtrace_block", json!(["latest"])).await;
    let manager = relay.redirects.manager("arbtrace").unwrap();
    assert_eq!(manager.dial_count(), 2);

    relay.stop().await;
}

#[tokio::test]
async fn disabled_redirect_reports_method_not_found() {
    let relay = TestRelay::start("", CONNECT_TIMEOUT, 5_000).await;

    let response = relay.call("arbtrace_call", json!([{}, ["trace"], "latest"])).await;
    assert_eq!(response["error"]["code"], codes::METHOD_NOT_FOUND);
    assert!(relay.redirects.manager("arbtrace").is_none());

    let modules = relay.call("rpc_modules", json!([])).await;
    assert!(modules["result"].get("arbtrace").is_none());

    relay.stop().await;
}

#[tokio::test]
async fn timed_out_call_leaves_the_connection_usable() {
    let stub = ClassicStub::start().await;
    let relay = TestRelay::start(&stub.endpoint(), CONNECT_TIMEOUT, 200).await;

    let response = relay.call("arbtrace_hang", json!([])).await;
    assert_eq!(response["error"]["code"], codes::REQUEST_TIMED_OUT);

    let response = relay.call("arbtrace_block", json!(["0x1"])).await;
    assert_eq!(response["result"], json!([]));
    assert_eq!(stub.connections(), 1);
    assert_eq!(relay.redirects.manager("arbtrace").unwrap().dial_count(), 1);

    relay.stop().await;
}

#[tokio::test]
async fn concurrent_first_calls_share_one_dial() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let responses = join_all((0..16).map(|n| relay.call("arbtrace_block", json!([n])))).await;
    for response in &responses {
        assert_eq!(response["result"], json!([]));
    }

    assert_eq!(stub.calls().len(), 16);
    assert_eq!(stub.connections(), 1);
    assert_eq!(relay.redirects.manager("arbtrace").unwrap().dial_count(), 1);

    relay.stop().await;
}

#[tokio::test]
async fn batch_mixes_local_and_redirected_calls() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let response = relay
        .post(json!([
            {"jsonrpc": "2.0", "id": "a", "method": "net_listening"},
            {"jsonrpc": "2.0", "id": "b", "method": "arbtrace_block", "params": ["0x7"]},
            {"jsonrpc": "2.0", "id": "c", "method": "eth_blockNumber"},
        ]))
        .await;

    assert_eq!(
        response,
        json!([
            {"jsonrpc": "2.0", "id": "a", "result": true},
            {"jsonrpc": "2.0", "id": "b", "result": []},
            {
                "jsonrpc": "2.0",
                "id": "c",
                "error": {"code": codes::METHOD_NOT_FOUND, "message": "the method eth_blockNumber does not exist/is not available"}
            },
        ])
    );
    assert_eq!(stub.calls(), vec![("arbtrace_block".to_string(), json!(["0x7"]))]);

    relay.stop().await;
}

#[tokio::test]
async fn rpc_modules_advertises_the_redirected_namespace() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let response = relay.call("rpc_modules", json!([])).await;
    assert_eq!(response["result"]["arbtrace"], "1.0");
    assert_eq!(response["result"]["web3"], "1.0");
    // Listing modules never dials the classic node.
    assert_eq!(stub.connections(), 0);

    relay.stop().await;
}

#[tokio::test]
async fn health_tracks_the_redirect_connection() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;

    let health = relay.get_json("/health").await;
    assert_eq!(health["state"], "ready");
    assert_eq!(health["redirects"][0]["namespace"], "arbtrace");
    assert_eq!(health["redirects"][0]["state"], "idle");

    relay.call("arbtrace_block", json!(["0x1"])).await;

    let health = relay.get_json("/health").await;
    assert_eq!(health["redirects"][0]["state"], "ready");
    assert_eq!(health["redirects"][0]["dials"], 1);

    relay.stop().await;
}

#[tokio::test]
async fn shutdown_closes_the_redirect_connection() {
    let stub = ClassicStub::start().await;
    let relay = relay_for(&stub).await;
    relay.call("arbtrace_block", json!(["0x1"])).await;

    let redirects = std::sync::Arc::clone(&relay.redirects);
    relay.stop().await;

    let manager = redirects.manager("arbtrace").unwrap();
    assert_eq!(manager.state(), ManagerState::Closed);
}
