// Bridge client
// Keeps one outbound connection to the relay: authenticate, heartbeat,
// dispatch jobs, and reconnect per the policy until told to stop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{SplitStream, StreamExt};
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use promptrelay_core::domain::{BridgeConnection, BridgeState, DomainError};

use crate::dispatch::Dispatcher;
use crate::error::BridgeError;
use crate::protocol::{decode, BridgeMessage, Incoming};
use crate::reconnect::{
    ReconnectDecision, ReconnectPolicy, AUTH_TIMEOUT, HEARTBEAT_INTERVAL, NORMAL_CLOSE_CODE,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub url: String,
    pub token: String,
    pub reconnect: ReconnectPolicy,
    pub heartbeat_interval: Duration,
    pub auth_timeout: Duration,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            auth_timeout: AUTH_TIMEOUT,
        }
    }
}

/// How one connection ended
#[derive(Debug)]
struct SessionEnd {
    close_code: Option<u16>,
    reason: String,
}

impl SessionEnd {
    fn dropped(reason: impl Into<String>) -> Self {
        Self {
            close_code: None,
            reason: reason.into(),
        }
    }

    fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self {
                close_code: Some(u16::from(frame.code)),
                reason: frame.reason.to_string(),
            },
            None => Self::dropped("closed without a code"),
        }
    }
}

pub struct BridgeClient {
    config: BridgeConfig,
    dispatcher: Dispatcher,
    connection: Arc<Mutex<BridgeConnection>>,
    cancel: CancellationToken,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig, dispatcher: Dispatcher, cancel: CancellationToken) -> Self {
        Self {
            config,
            dispatcher,
            connection: Arc::new(Mutex::new(BridgeConnection::new())),
            cancel,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.connection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .state()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.connection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .reconnect_attempts()
    }

    fn transition(
        &self,
        step: impl FnOnce(&mut BridgeConnection) -> Result<(), DomainError>,
    ) {
        let mut connection = self.connection.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = step(&mut connection) {
            debug!(error = %e, "Bridge state unchanged");
        }
    }

    /// Run until cancelled, rejected, or out of reconnect attempts
    ///
    /// # Errors
    /// - BridgeError::TransportRejected if the relay closed with the auth-rejected code
    /// - BridgeError::RetriesExhausted once the reconnect budget is spent
    pub async fn run(&self) -> Result<(), BridgeError> {
        loop {
            let end = self.connect_once().await;
            self.transition(BridgeConnection::closed);

            let attempts = self.reconnect_attempts();
            let decision =
                self.config
                    .reconnect
                    .decide(end.close_code, attempts, self.cancel.is_cancelled());
            match decision {
                ReconnectDecision::Stop => {
                    info!("Bridge stopped");
                    return Ok(());
                }
                ReconnectDecision::Rejected => {
                    error!(reason = %end.reason, "Relay rejected authentication, not retrying");
                    return Err(BridgeError::TransportRejected(end.reason));
                }
                ReconnectDecision::GiveUp => {
                    error!(attempts, "Bridge reconnect budget exhausted");
                    return Err(BridgeError::RetriesExhausted(attempts));
                }
                ReconnectDecision::Retry { delay } => {
                    warn!(
                        close_code = ?end.close_code,
                        reason = %end.reason,
                        attempt = attempts + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Bridge closed, reconnecting"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            info!("Bridge stopped during reconnect delay");
                            return Ok(());
                        }
                    }
                    self.transition(BridgeConnection::retry);
                }
            }
        }
    }

    /// One connection lifetime: connect, authenticate, serve
    async fn connect_once(&self) -> SessionEnd {
        let connected = tokio::select! {
            result = connect_async(self.config.url.as_str()) => result,
            _ = self.cancel.cancelled() => return SessionEnd::dropped("cancelled"),
        };
        let ws = match connected {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "Relay connect failed");
                return SessionEnd::dropped(e.to_string());
            }
        };
        self.transition(BridgeConnection::opened);
        info!(url = %self.config.url, "Relay connected");

        let (mut sink, mut stream) = ws.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        // single writer; replies from job tasks funnel through here
        let writer = tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "Relay write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let end = match self.authenticate(&mut stream, &outgoing).await {
            Ok(()) => {
                self.transition(BridgeConnection::authenticated);
                info!("Relay authenticated");
                self.serve(&mut stream, &outgoing).await
            }
            Err(end) => end,
        };

        drop(outgoing);
        if timeout(Duration::from_secs(1), writer).await.is_err() {
            debug!("Relay writer did not finish in time");
        }
        end
    }

    async fn authenticate(
        &self,
        stream: &mut SplitStream<WsStream>,
        outgoing: &mpsc::UnboundedSender<Message>,
    ) -> Result<(), SessionEnd> {
        let auth = BridgeMessage::auth(&self.config.token)
            .encode()
            .map_err(|e| SessionEnd::dropped(e.to_string()))?;
        outgoing
            .send(Message::Text(auth))
            .map_err(|_| SessionEnd::dropped("writer gone"))?;

        let wait = async {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match decode(&text) {
                        Ok(Incoming::Message(BridgeMessage::AuthSuccess)) => return Ok(()),
                        Ok(other) => debug!(frame = ?other, "Ignoring frame before auth_success"),
                        Err(e) => warn!(error = %e, "Undecodable relay frame"),
                    },
                    Ok(Message::Close(frame)) => return Err(SessionEnd::from_frame(frame)),
                    Ok(_) => {}
                    Err(e) => return Err(SessionEnd::dropped(e.to_string())),
                }
            }
            Err(SessionEnd::dropped("relay hung up during auth"))
        };

        tokio::select! {
            result = timeout(self.config.auth_timeout, wait) => match result {
                Ok(result) => result,
                Err(_) => Err(SessionEnd::dropped("auth_success not received in time")),
            },
            _ = self.cancel.cancelled() => {
                send_normal_close(outgoing);
                Err(SessionEnd {
                    close_code: Some(NORMAL_CLOSE_CODE),
                    reason: "shutdown".to_string(),
                })
            }
        }
    }

    async fn serve(
        &self,
        stream: &mut SplitStream<WsStream>,
        outgoing: &mpsc::UnboundedSender<Message>,
    ) -> SessionEnd {
        let period = self.config.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Closing relay connection");
                    send_normal_close(outgoing);
                    return SessionEnd {
                        close_code: Some(NORMAL_CLOSE_CODE),
                        reason: "shutdown".to_string(),
                    };
                }
                _ = heartbeat.tick() => {
                    debug!("Relay heartbeat");
                    send(outgoing, &BridgeMessage::Ping);
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.on_text(&text, outgoing).await,
                    Some(Ok(Message::Close(frame))) => return SessionEnd::from_frame(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::dropped(e.to_string()),
                    None => return SessionEnd::dropped("relay hung up"),
                },
            }
        }
    }

    async fn on_text(&self, text: &str, outgoing: &mpsc::UnboundedSender<Message>) {
        let incoming = match decode(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!(error = %e, "Undecodable relay frame");
                return;
            }
        };

        if Dispatcher::is_job(&incoming) {
            // jobs run beside the read loop so heartbeats keep flowing
            let dispatcher = self.dispatcher.clone();
            let outgoing = outgoing.clone();
            tokio::spawn(async move {
                if let Some(reply) = dispatcher.handle(incoming).await {
                    send(&outgoing, &reply);
                }
            });
        } else if let Some(reply) = self.dispatcher.handle(incoming).await {
            send(outgoing, &reply);
        }
    }
}

fn send(outgoing: &mpsc::UnboundedSender<Message>, message: &BridgeMessage) {
    match message.encode() {
        Ok(text) => {
            if outgoing.send(Message::Text(text)).is_err() {
                warn!("Relay connection gone, reply dropped");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode relay message"),
    }
}

fn send_normal_close(outgoing: &mpsc::UnboundedSender<Message>) {
    let _ = outgoing.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "shutdown".into(),
    })));
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptrelay_core::application::{AdapterRegistry, PromptService};
    use promptrelay_core::domain::ServiceTarget;
    use promptrelay_core::port::id_provider::mocks::SequentialIdProvider;
    use promptrelay_core::port::page_driver::mocks::FakeDom;
    use promptrelay_core::port::session_provider::mocks::MockSessionProvider;
    use promptrelay_core::port::time_provider::mocks::FixedTimeProvider;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    type ServerWs = WebSocketStream<TcpStream>;

    fn dispatcher() -> Dispatcher {
        let dom = Arc::new(FakeDom::new("https://www.midjourney.com/imagine"));
        dom.add_element(&dom.root(), "textarea", &[]);
        let sessions = MockSessionProvider::new().with_page(ServiceTarget::Midjourney, dom);
        Dispatcher::new(Arc::new(PromptService::new(
            Arc::new(sessions),
            AdapterRegistry::with_defaults(),
            Arc::new(SequentialIdProvider::default()),
            Arc::new(FixedTimeProvider::new(0)),
        )))
    }

    fn fast_config(url: &str) -> BridgeConfig {
        let mut config = BridgeConfig::new(url, "tok-1");
        config.reconnect = ReconnectPolicy {
            delay: Duration::from_millis(100),
            max_attempts: 3,
        };
        config.heartbeat_interval = Duration::from_secs(60);
        config.auth_timeout = Duration::from_secs(5);
        config
    }

    async fn relay() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn next_json(ws: &mut ServerWs) -> Option<Value> {
        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => return Some(serde_json::from_str(&text).unwrap()),
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    }

    async fn accept_authed(listener: &TcpListener) -> ServerWs {
        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        let auth = next_json(&mut ws).await.unwrap();
        assert_eq!(auth["type"], "auth");
        assert_eq!(auth["token"], "tok-1");
        assert_eq!(auth["clientType"], "promptrelay");
        ws.send(Message::Text(json!({ "type": "auth_success" }).to_string()))
            .await
            .unwrap();
        ws
    }

    async fn close_code(ws: &mut ServerWs) -> Option<u16> {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Close(frame) = message {
                return frame.map(|f| u16::from(f.code));
            }
        }
        None
    }

    async fn close_with(ws: &mut ServerWs, code: u16, reason: &'static str) {
        ws.close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        }))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    }

    fn spawn_client(url: &str, cancel: &CancellationToken) -> (Arc<BridgeClient>, tokio::task::JoinHandle<Result<(), BridgeError>>) {
        let client = Arc::new(BridgeClient::new(
            fast_config(url),
            dispatcher(),
            cancel.clone(),
        ));
        let runner = Arc::clone(&client);
        let handle = tokio::spawn(async move { runner.run().await });
        (client, handle)
    }

    #[tokio::test]
    async fn test_dispatches_job_then_closes_normally_on_cancel() {
        let (listener, url) = relay().await;
        let cancel = CancellationToken::new();
        let (client, handle) = spawn_client(&url, &cancel);

        let mut ws = accept_authed(&listener).await;
        let job = json!({
            "type": "submit_prompt",
            "messageId": "m-17",
            "service": "midjourney",
            "prompt": "a paper boat on a puddle"
        });
        ws.send(Message::Text(job.to_string())).await.unwrap();

        let reply = next_json(&mut ws).await.unwrap();
        assert_eq!(
            reply,
            json!({ "type": "prompt_result", "messageId": "m-17", "success": true })
        );
        assert_eq!(client.state(), BridgeState::Authenticated);

        cancel.cancel();
        assert_eq!(close_code(&mut ws).await, Some(NORMAL_CLOSE_CODE));
        handle.await.unwrap().unwrap();
        assert_eq!(client.state(), BridgeState::Closed);
    }

    #[tokio::test]
    async fn test_auth_rejection_is_terminal() {
        let (listener, url) = relay().await;
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            next_json(&mut ws).await.unwrap();
            close_with(&mut ws, 4001, "invalid token").await;
            listener
        });

        let cancel = CancellationToken::new();
        let (_client, handle) = spawn_client(&url, &cancel);

        let err = timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransportRejected(ref r) if r == "invalid token"));

        // no second connection is attempted
        let listener = server.await.unwrap();
        assert!(timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_abnormal_close_reconnects_once_after_delay() {
        let (listener, url) = relay().await;
        let cancel = CancellationToken::new();
        let (client, handle) = spawn_client(&url, &cancel);

        let mut first = accept_authed(&listener).await;
        close_with(&mut first, 1011, "relay restarting").await;
        let closed_at = Instant::now();

        let mut second = accept_authed(&listener).await;
        assert!(closed_at.elapsed() >= Duration::from_millis(50));

        // a good auth resets the budget
        let ping = json!({ "type": "ping" });
        second.send(Message::Text(ping.to_string())).await.unwrap();
        assert_eq!(next_json(&mut second).await.unwrap()["type"], "pong");
        assert_eq!(client.reconnect_attempts(), 0);

        cancel.cancel();
        assert_eq!(close_code(&mut second).await, Some(NORMAL_CLOSE_CODE));
        handle.await.unwrap().unwrap();
        assert!(timeout(Duration::from_millis(200), listener.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_frames_are_ignored() {
        let (listener, url) = relay().await;
        let cancel = CancellationToken::new();
        let (_client, handle) = spawn_client(&url, &cancel);

        let mut ws = accept_authed(&listener).await;
        for frame in [
            json!({ "type": "tab_update", "tabId": 3 }),
            json!({ "type": "ping" }),
        ] {
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }
        assert_eq!(next_json(&mut ws).await.unwrap(), json!({ "type": "pong" }));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heartbeat_pings_while_authenticated() {
        let (listener, url) = relay().await;
        let cancel = CancellationToken::new();
        let mut config = fast_config(&url);
        config.heartbeat_interval = Duration::from_millis(50);
        let client = Arc::new(BridgeClient::new(config, dispatcher(), cancel.clone()));
        let runner = Arc::clone(&client);
        let handle = tokio::spawn(async move { runner.run().await });

        let mut ws = accept_authed(&listener).await;
        assert_eq!(next_json(&mut ws).await.unwrap(), json!({ "type": "ping" }));
        assert_eq!(next_json(&mut ws).await.unwrap(), json!({ "type": "ping" }));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
