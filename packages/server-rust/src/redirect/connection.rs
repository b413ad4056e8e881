//! Multiplexed JSON-RPC client connection to a redirect endpoint.
//!
//! One stream carries newline-delimited JSON-RPC objects in both directions.
//! A writer task owns the sink, a reader task owns the stream, and callers
//! are matched to responses through a `DashMap` of pending `oneshot`
//! senders keyed by request id.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use relay_core::{JsonRpcRequest, JsonRpcResponse};
use serde_json::value::RawValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ForwardError;
use super::target::Endpoint;

/// Outbound frames buffered ahead of the writer task.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

type PendingMap = DashMap<u64, oneshot::Sender<Result<Box<RawValue>, ForwardError>>>;

// ---------------------------------------------------------------------------
// RedirectConnection
// ---------------------------------------------------------------------------

/// A live connection to a redirect endpoint.
///
/// Calls may be issued concurrently from any number of tasks; each gets its
/// own request id and waits only for its own response. Once the connection
/// is closed (locally, or because the peer went away) every pending and
/// future call fails with [`ForwardError::Closed`].
#[derive(Debug)]
pub struct RedirectConnection {
    endpoint: String,
    next_id: AtomicU64,
    pending: Arc<PendingMap>,
    outbound: mpsc::Sender<String>,
    closed: CancellationToken,
    writer: Mutex<Option<JoinHandle<Result<(), LinesCodecError>>>>,
}

impl RedirectConnection {
    /// Dials `endpoint` and starts the reader and writer tasks.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the socket cannot be opened.
    pub async fn dial(endpoint: &Endpoint, max_frame_bytes: usize) -> io::Result<Arc<Self>> {
        let label = endpoint.to_string();
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                stream.set_nodelay(true)?;
                Ok(Self::open(stream, label, max_frame_bytes))
            }
            #[cfg(unix)]
            Endpoint::Ipc(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                Ok(Self::open(stream, label, max_frame_bytes))
            }
            #[cfg(not(unix))]
            Endpoint::Ipc(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "IPC endpoints require a unix platform",
            )),
        }
    }

    /// Wraps an already-connected stream.
    pub fn open<S>(stream: S, endpoint: impl Into<String>, max_frame_bytes: usize) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let endpoint = endpoint.into();
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(max_frame_bytes));
        let (mut sink, mut frames) = framed.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let closed = CancellationToken::new();

        let writer = {
            let closed = closed.clone();
            let endpoint = endpoint.clone();
            tokio::spawn(async move {
                let mut outcome = Ok(());
                loop {
                    tokio::select! {
                        () = closed.cancelled() => break,
                        line = outbound_rx.recv() => {
                            let Some(line) = line else { break };
                            if let Err(e) = sink.send(line).await {
                                warn!(endpoint = %endpoint, error = %e, "redirect write failed");
                                outcome = Err(e);
                                break;
                            }
                        }
                    }
                }
                closed.cancel();
                let flushed = sink.close().await;
                outcome.and(flushed)
            })
        };

        {
            let closed = closed.clone();
            let pending = Arc::clone(&pending);
            let endpoint = endpoint.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = closed.cancelled() => break,
                        frame = frames.next() => match frame {
                            Some(Ok(line)) => deliver(&pending, &line),
                            Some(Err(e)) => {
                                warn!(endpoint = %endpoint, error = %e, "redirect read failed");
                                break;
                            }
                            None => {
                                debug!(endpoint = %endpoint, "redirect endpoint closed the connection");
                                break;
                            }
                        }
                    }
                }
                closed.cancel();
                // Dropping the senders wakes every waiter with `Closed`.
                pending.clear();
            });
        }

        Arc::new(Self {
            endpoint,
            next_id: AtomicU64::new(1),
            pending,
            outbound,
            closed,
            writer: Mutex::new(Some(writer)),
        })
    }

    /// The endpoint this connection was opened to, for logging.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the connection can no longer carry calls.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of calls currently waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Sends `method` with `params` and waits for the matching response.
    ///
    /// Each argument and the returned result keep their exact JSON text, so
    /// numbers beyond `f64` range or precision reach the endpoint unchanged.
    ///
    /// Dropping the returned future abandons the call: its correlation entry
    /// is removed and a late response is discarded. The connection itself is
    /// unaffected.
    ///
    /// # Errors
    ///
    /// `Remote` for an application error returned by the endpoint, `Closed`
    /// if the connection is or becomes closed, `Encode` if the request
    /// cannot be serialized.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Box<RawValue>>,
    ) -> Result<Box<RawValue>, ForwardError> {
        if self.is_closed() {
            return Err(ForwardError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = JsonRpcRequest::new(id, method, &params)
            .and_then(|request| serde_json::to_string(&request))
            .map_err(|e| ForwardError::Encode(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };
        self.pending.insert(id, tx);

        // The reader clears the map after marking the connection closed, so
        // an insert that raced with that clear is caught here.
        if self.is_closed() {
            return Err(ForwardError::Closed);
        }

        self.outbound
            .send(line)
            .await
            .map_err(|_| ForwardError::Closed)?;

        rx.await.unwrap_or(Err(ForwardError::Closed))
    }

    /// Marks the connection closed without waiting for the writer to finish.
    pub fn abort(&self) {
        self.closed.cancel();
        self.pending.clear();
    }

    /// Closes the connection and waits for the writer to shut the stream.
    ///
    /// Pending calls fail with `Closed`. Calling this more than once is
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns the I/O error hit while flushing or closing the stream.
    pub async fn close(&self) -> io::Result<()> {
        self.abort();
        let writer = self.writer.lock().take();
        let Some(writer) = writer else {
            return Ok(());
        };
        match writer.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(LinesCodecError::Io(e))) => Err(e),
            Ok(Err(e)) => Err(io::Error::other(e)),
            Err(join) => Err(io::Error::other(join)),
        }
    }
}

impl Drop for RedirectConnection {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Routes one inbound frame to the call waiting for it.
fn deliver(pending: &PendingMap, line: &str) {
    let response: JsonRpcResponse = match serde_json::from_str(line) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "discarding undecodable frame from redirect endpoint");
            return;
        }
    };

    let Some(id) = response.id.as_u64() else {
        // Endpoints answer requests they could not parse with a null id, so
        // the error cannot be tied to any one pending call.
        match &response.error {
            Some(error) => warn!(
                id = ?response.id,
                code = error.code,
                message = %error.message,
                "redirect endpoint returned an error without a usable id"
            ),
            None => debug!(id = ?response.id, "discarding frame without a numeric id"),
        }
        return;
    };

    match pending.remove(&id) {
        Some((_, waiter)) => {
            // The waiter may have been dropped in the meantime; nothing to do then.
            let _ = waiter.send(response.into_outcome().map_err(ForwardError::Remote));
        }
        None => debug!(id, "discarding response for an abandoned call"),
    }
}

/// Removes a call's correlation entry when the call finishes or is dropped.
struct PendingEntry<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
