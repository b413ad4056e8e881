//! Shared setup for relay integration tests: a scripted classic node on a
//! Unix socket and a relay node serving HTTP on an ephemeral port.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_core::{ErrorObject, JsonRpcRequest, JsonRpcResponse};
use relay_server::network::NetworkConfig;
use relay_server::{RedirectSet, RedirectTarget, RelayNode, ServerConfig};
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Remote error returned by the stub for `arbtrace_fail`.
pub fn missing_trie_node() -> ErrorObject {
    ErrorObject::new(-32000, "missing trie node").with_data(json!("0xdeadbeef"))
}

/// A classic node stand-in listening on a Unix socket.
///
/// `arbtrace_hang` is never answered, `arbtrace_fail` gets
/// [`missing_trie_node`], `arbtrace_echo` gets its own params text back as
/// the result, and everything else gets an empty trace list. Every request
/// it reads is recorded in arrival order with its params exactly as sent.
pub struct ClassicStub {
    _dir: TempDir,
    path: PathBuf,
    calls: Arc<Mutex<Vec<(String, String)>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl ClassicStub {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classic.ipc");
        let listener = UnixListener::bind(&path).unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let calls = Arc::clone(&calls);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let calls = Arc::clone(&calls);
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let request: JsonRpcRequest = serde_json::from_str(&line).unwrap();
                            let params = request.params.as_ref().map_or("null", |p| p.get());
                            calls.lock().push((request.method.clone(), params.to_string()));
                            let id = request.id.clone().unwrap();
                            let response = match request.method.as_str() {
                                "arbtrace_hang" => continue,
                                "arbtrace_fail" => JsonRpcResponse::failure(id, missing_trie_node()),
                                "arbtrace_echo" => JsonRpcResponse::success(
                                    id,
                                    RawValue::from_string(params.to_string()).unwrap(),
                                ),
                                _ => JsonRpcResponse::success(
                                    id,
                                    RawValue::from_string("[]".into()).unwrap(),
                                ),
                            };
                            let mut out = serde_json::to_string(&response).unwrap();
                            out.push('\n');
                            if write.write_all(out.as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
            })
        };

        Self {
            _dir: dir,
            path,
            calls,
            connections,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        self.path.display().to_string()
    }

    /// Requests received so far as `(method, params)`.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.raw_calls()
            .into_iter()
            .map(|(method, params)| (method, serde_json::from_str(&params).unwrap()))
            .collect()
    }

    /// Requests received so far with the params text exactly as it arrived.
    pub fn raw_calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for ClassicStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A relay node serving on `127.0.0.1` with an OS-assigned port.
pub struct TestRelay {
    pub url: String,
    pub redirects: Arc<RedirectSet>,
    client: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl TestRelay {
    /// Starts a relay redirecting `arbtrace` to `endpoint` (empty disables it).
    pub async fn start(endpoint: &str, connect_timeout: Duration, call_timeout_ms: u64) -> Self {
        Self::start_redirecting("arbtrace", endpoint, connect_timeout, call_timeout_ms).await
    }

    pub async fn start_redirecting(
        namespace: &str,
        endpoint: &str,
        connect_timeout: Duration,
        call_timeout_ms: u64,
    ) -> Self {
        let server = ServerConfig {
            node_id: "integration".into(),
            default_call_timeout_ms: call_timeout_ms,
            redirects: vec![RedirectTarget::new(namespace, endpoint, connect_timeout)],
            ..ServerConfig::default()
        };
        let network = NetworkConfig {
            port: 0,
            drain_timeout: Duration::from_millis(500),
            ..NetworkConfig::default()
        };

        let mut node = RelayNode::new(server, network).unwrap();
        let port = node.start().await.unwrap();
        let redirects = Arc::clone(node.redirects());

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(node.run(async move {
            let _ = stopped.await;
        }));

        Self {
            url: format!("http://127.0.0.1:{port}/"),
            redirects,
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            stop: Some(stop),
            task,
        }
    }

    /// Posts a raw JSON body and returns the decoded response body.
    pub async fn post(&self, body: Value) -> Value {
        let response = self.client.post(&self.url).json(&body).send().await.unwrap();
        assert!(response.status().is_success(), "HTTP {}", response.status());
        response.json().await.unwrap()
    }

    /// Posts `body` byte for byte and returns the response body text.
    pub async fn post_text(&self, body: &str) -> String {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success(), "HTTP {}", response.status());
        response.text().await.unwrap()
    }

    /// Calls one method with id 1.
    pub async fn call(&self, method: &str, params: Value) -> Value {
        self.post(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
            .await
    }

    pub async fn get_json(&self, path: &str) -> Value {
        let url = format!("{}{}", self.url, path.trim_start_matches('/'));
        self.client.get(url).send().await.unwrap().json().await.unwrap()
    }

    /// Triggers shutdown and waits for the node to stop.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.task)
            .await
            .expect("relay did not stop")
            .unwrap()
            .unwrap();
    }
}
