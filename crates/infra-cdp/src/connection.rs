// CDP WebSocket connection
// One socket per page target. Commands are correlated to responses by id;
// a reader task resolves waiters, a writer task owns the sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::CdpError;

/// Upper bound for any single CDP command (30s)
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// Raw frame as sent by the browser
#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ErrorObject>,
    method: Option<String>,
}

/// A decoded incoming frame
#[derive(Debug)]
pub enum Frame {
    Response {
        id: u64,
        result: Result<Value, CdpError>,
    },
    Event {
        method: String,
    },
}

/// Decode one text frame
pub fn parse_frame(text: &str) -> Result<Frame, CdpError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    match (raw.id, raw.method) {
        (Some(id), _) => {
            let result = match raw.error {
                Some(err) => Err(CdpError::Protocol {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            };
            Ok(Frame::Response { id, result })
        }
        (None, Some(method)) => Ok(Frame::Event { method }),
        (None, None) => Err(CdpError::UnexpectedResponse(text.to_string())),
    }
}

pub struct CdpConnection {
    url: String,
    next_id: AtomicU64,
    pending: Pending,
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
    command_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpConnection {
    /// Open a socket to a target's `webSocketDebuggerUrl`
    pub async fn connect(url: &str) -> Result<Self, CdpError> {
        let (ws_stream, _response) = connect_async(url).await.map_err(|e| CdpError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        info!(url = %url, "CDP session connected");

        let (mut sink, mut stream) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "CDP write failed");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reader_connected = Arc::clone(&connected);
        let reader_url = url.to_string();
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Ok(Frame::Response { id, result }) => {
                            let waiter = reader_pending
                                .lock()
                                .unwrap_or_else(|p| p.into_inner())
                                .remove(&id);
                            if let Some(waiter) = waiter {
                                let _ = waiter.send(result);
                            }
                        }
                        Ok(Frame::Event { method }) => {
                            debug!(method = %method, "CDP event");
                        }
                        Err(e) => warn!(error = %e, "Undecodable CDP frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "CDP socket closed by browser");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "CDP receive error");
                        break;
                    }
                }
            }

            reader_connected.store(false, Ordering::SeqCst);
            let waiters: Vec<_> = reader_pending
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .drain()
                .collect();
            for (_, waiter) in waiters {
                let _ = waiter.send(Err(CdpError::Closed));
            }
            info!(url = %reader_url, "CDP session ended");
        });

        Ok(Self {
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            pending,
            outgoing,
            connected,
            command_timeout: COMMAND_TIMEOUT,
            reader,
            writer,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Send a command and wait for its response
    ///
    /// # Errors
    /// - CdpError::Closed if the socket is gone (before or during the call)
    /// - CdpError::Timeout after `COMMAND_TIMEOUT`
    /// - CdpError::Protocol if the browser answered with an error object
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        if !self.is_connected() {
            return Err(CdpError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, tx);
        // the reader may have drained waiters between the first check and the insert
        if !self.is_connected() {
            self.forget(id);
            return Err(CdpError::Closed);
        }

        let frame = json!({ "id": id, "method": method, "params": params });
        if self
            .outgoing
            .send(Message::Text(frame.to_string()))
            .is_err()
        {
            self.forget(id);
            return Err(CdpError::Closed);
        }
        debug!(id, method = %method, "CDP command sent");

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::Closed),
            Err(_) => {
                self.forget(id);
                Err(CdpError::Timeout {
                    method: method.to_string(),
                    ms: self.command_timeout.as_millis() as u64,
                })
            }
        }
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&id);
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn test_parse_response_and_error() {
        match parse_frame(r#"{"id":3,"result":{"result":{"type":"string","value":"complete"}}}"#)
            .unwrap()
        {
            Frame::Response { id, result } => {
                assert_eq!(id, 3);
                assert_eq!(result.unwrap()["result"]["value"], "complete");
            }
            other => panic!("unexpected frame {:?}", other),
        }

        match parse_frame(
            r#"{"id":4,"error":{"code":-32000,"message":"Cannot find context with specified id"}}"#,
        )
        .unwrap()
        {
            Frame::Response { result, .. } => {
                assert!(matches!(result, Err(CdpError::Protocol { code: -32000, .. })));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_parse_event() {
        let frame = parse_frame(r#"{"method":"Page.frameNavigated","params":{}}"#).unwrap();
        assert!(matches!(frame, Frame::Event { ref method } if method == "Page.frameNavigated"));
    }

    /// Minimal DevTools endpoint: echoes the method name back, then hangs up
    async fn echo_server(answers: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            for _ in 0..answers {
                let Some(Ok(Message::Text(text))) = ws.next().await else {
                    return;
                };
                let request: Value = serde_json::from_str(&text).unwrap();
                let reply = json!({ "id": request["id"], "result": { "echo": request["method"] } });
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
            let _ = ws.close(None).await;
        });
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_call_round_trip_then_closed() {
        let url = echo_server(1).await;
        let conn = assert_ok!(CdpConnection::connect(&url).await);

        let result = conn.call("Runtime.evaluate", json!({})).await.unwrap();
        assert_eq!(result["echo"], "Runtime.evaluate");

        // the server hangs up after one answer
        let err = conn.call("Runtime.evaluate", json!({})).await.unwrap_err();
        assert!(matches!(err, CdpError::Closed));
        assert!(!conn.is_connected());
    }
}
