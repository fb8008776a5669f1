use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use tracing::{debug, info, trace, warn};

use crate::error::{PlatformError, Result};
use crate::event::PlatformEvent;
use crate::source::{ConnectionConfig, ConnectionState, PlatformSource, SourceConnection};
use crate::tls::install_rustls_provider;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `receive` waits before reporting an idle poll.
const RECEIVE_POLL_MS: u64 = 100;

/// Protocol definitions for a specific platform.
#[async_trait]
pub trait SourceProtocol: Send + Sync + 'static {
    /// Platform name (e.g., "tiktok", "kick")
    fn platform(&self) -> &str;

    /// Get the WebSocket URL for a username/channel
    async fn websocket_url(&self, identity: &str) -> Result<String>;

    /// Extra headers for the WebSocket upgrade request
    fn headers(&self, _identity: &str) -> Vec<(String, String)> {
        vec![]
    }

    /// Messages to send right after the connection opens
    async fn handshake_messages(&self, _identity: &str) -> Result<Vec<Message>> {
        Ok(vec![])
    }

    /// Generate heartbeat message (if any)
    fn heartbeat_message(&self) -> Option<Message> {
        None
    }

    /// Heartbeat interval (default: 30 seconds)
    fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// Decode a WebSocket frame into zero or more events.
    fn decode_message(&self, message: &Message, identity: &str) -> Result<Vec<PlatformEvent>>;
}

/// Reconnect and buffering settings for a WebSocket source.
#[derive(Clone, Copy, Debug)]
pub struct WebSocketSourceConfig {
    /// Reconnect to the same identity after an unexpected close
    pub reconnect: bool,
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay_ms: u64,
    /// Capacity of the decoded event buffer
    pub channel_capacity: usize,
}

impl Default for WebSocketSourceConfig {
    fn default() -> Self {
        Self {
            reconnect: true,
            reconnect_delay_ms: 2000,
            channel_capacity: 100,
        }
    }
}

impl WebSocketSourceConfig {
    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }
}

/// Internal state for a WebSocket connection
struct WsConnectionState {
    /// Event receiver
    event_rx: mpsc::Receiver<PlatformEvent>,
    /// Task handles
    tasks: Vec<JoinHandle<()>>,
    /// Shutdown sender
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl WsConnectionState {
    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for WsConnectionState {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// How a live stream ended.
enum StreamEnd {
    /// Shutdown was requested; do not reconnect.
    Shutdown,
    /// The socket closed or errored.
    Lost,
}

/// A generic WebSocket-based platform source.
pub struct WebSocketSource<P> {
    /// Protocol implementation
    protocol: Arc<P>,
    /// Settings
    config: WebSocketSourceConfig,
    /// Active connections
    connections: RwLock<HashMap<String, Arc<Mutex<WsConnectionState>>>>,
}

impl<P: SourceProtocol> WebSocketSource<P> {
    pub fn with_protocol(protocol: P, config: Option<WebSocketSourceConfig>) -> Self {
        Self {
            protocol: Arc::new(protocol),
            config: config.unwrap_or_default(),
            connections: RwLock::new(HashMap::new()),
        }
    }

    fn spawn_connection(
        &self,
        connection: &SourceConnection,
        config: ConnectionConfig,
    ) -> (mpsc::Receiver<PlatformEvent>, mpsc::Sender<()>, JoinHandle<()>) {
        let ws_config = config.websocket.unwrap_or(self.config);
        let (event_tx, event_rx) = mpsc::channel(ws_config.channel_capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let protocol = self.protocol.clone();
        let handle_state = connection.clone();

        let handle = tokio::spawn(async move {
            let identity = handle_state.identity.clone();
            let mut attempt: u32 = 0;

            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                handle_state.set_state(ConnectionState::Connecting);
                match open_stream(protocol.as_ref(), &identity).await {
                    Ok(stream) => {
                        info!(
                            platform = protocol.platform(),
                            identity = %identity,
                            "Connected to event stream"
                        );
                        attempt = 0;
                        handle_state.set_reconnect_count(0);
                        handle_state.set_state(ConnectionState::Connected);

                        let end = pump_stream(
                            protocol.as_ref(),
                            &identity,
                            stream,
                            &event_tx,
                            &mut shutdown_rx,
                        )
                        .await;
                        handle_state.set_state(ConnectionState::Disconnected);
                        if let StreamEnd::Shutdown = end {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(
                            platform = protocol.platform(),
                            identity = %identity,
                            error = %e,
                            "Connection failed"
                        );
                        handle_state.set_state(ConnectionState::Disconnected);
                    }
                }

                if !ws_config.reconnect || event_tx.is_closed() {
                    break;
                }
                attempt += 1;
                handle_state.set_reconnect_count(attempt);

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(ws_config.reconnect_delay_ms)) => {},
                    _ = shutdown_rx.recv() => break,
                }
                debug!(identity = %identity, attempt, "Reconnecting");
            }

            handle_state.set_state(ConnectionState::Disconnected);
            debug!("WebSocket task for {} stopped", identity);
        });

        (event_rx, shutdown_tx, handle)
    }
}

async fn open_stream<P: SourceProtocol>(protocol: &P, identity: &str) -> Result<WsStream> {
    let url = protocol.websocket_url(identity).await?;
    if url.starts_with("wss://") {
        install_rustls_provider();
    }
    debug!("Connecting to WebSocket: {}", url);

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| PlatformError::connection(format!("Invalid WebSocket URL {url}: {e}")))?;
    for (name, value) in protocol.headers(identity) {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| PlatformError::protocol(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| PlatformError::protocol(format!("Invalid header value: {e}")))?;
        request.headers_mut().insert(name, value);
    }

    let (mut stream, _) = connect_async(request)
        .await
        .map_err(|e| PlatformError::connection(e.to_string()))?;

    for msg in protocol.handshake_messages(identity).await? {
        stream
            .send(msg)
            .await
            .map_err(|e| PlatformError::connection(format!("Handshake failed: {e}")))?;
    }

    Ok(stream)
}

async fn pump_stream<P: SourceProtocol>(
    protocol: &P,
    identity: &str,
    mut stream: WsStream,
    event_tx: &mpsc::Sender<PlatformEvent>,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> StreamEnd {
    let heartbeat_enabled = protocol.heartbeat_message().is_some();
    let mut heartbeat_timer = tokio::time::interval(protocol.heartbeat_interval());
    heartbeat_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = heartbeat_timer.tick(), if heartbeat_enabled => {
                if let Some(msg) = protocol.heartbeat_message() {
                    if let Err(e) = stream.send(msg).await {
                        warn!("Failed to send heartbeat: {}", e);
                        return StreamEnd::Lost;
                    }
                    trace!("Sent heartbeat for {}", identity);
                }
            }

            msg_opt = stream.next() => {
                match msg_opt {
                    Some(Ok(Message::Ping(data))) => {
                        if stream.send(Message::Pong(data)).await.is_err() {
                            return StreamEnd::Lost;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("WebSocket stream closed for {}", identity);
                        return StreamEnd::Lost;
                    }
                    Some(Ok(msg)) => {
                        match protocol.decode_message(&msg, identity) {
                            Ok(events) => {
                                for event in events {
                                    if event_tx.send(event).await.is_err() {
                                        // Nobody is reading anymore.
                                        let _ = stream.close(None).await;
                                        return StreamEnd::Shutdown;
                                    }
                                }
                            }
                            Err(e) => {
                                debug!("Dropping undecodable frame: {}", e);
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        return StreamEnd::Lost;
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                let _ = stream.close(None).await;
                return StreamEnd::Shutdown;
            }
        }
    }
}

#[async_trait]
impl<P: SourceProtocol> PlatformSource for WebSocketSource<P> {
    fn platform(&self) -> &str {
        self.protocol.platform()
    }

    async fn connect(&self, identity: &str, config: ConnectionConfig) -> Result<SourceConnection> {
        if identity.trim().is_empty() {
            return Err(PlatformError::connection("Identity must not be empty"));
        }

        let connection_id = format!("{}-{}-{}", self.platform(), identity, uuid::Uuid::new_v4());
        let connection = SourceConnection::new(connection_id.clone(), self.platform(), identity);

        let (event_rx, shutdown_tx, task) = self.spawn_connection(&connection, config);

        let state = WsConnectionState {
            event_rx,
            tasks: vec![task],
            shutdown_tx: Some(shutdown_tx),
        };

        self.connections
            .write()
            .await
            .insert(connection_id, Arc::new(Mutex::new(state)));

        Ok(connection)
    }

    async fn disconnect(&self, connection: &mut SourceConnection) -> Result<()> {
        let removed = self.connections.write().await.remove(&connection.id);
        if let Some(state_arc) = removed {
            let mut state = state_arc.lock().await;
            if let Some(tx) = state.shutdown_tx.take() {
                let _ = tx.try_send(());
            }
            state.abort_tasks();
        }
        connection.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn receive(&self, connection: &SourceConnection) -> Result<Option<PlatformEvent>> {
        let state_arc = {
            let map = self.connections.read().await;
            map.get(&connection.id).cloned()
        };

        let Some(state_arc) = state_arc else {
            return Err(PlatformError::connection("Connection not found"));
        };

        let mut state = state_arc.lock().await;
        match tokio::time::timeout(
            Duration::from_millis(RECEIVE_POLL_MS),
            state.event_rx.recv(),
        )
        .await
        {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                drop(state);
                let _ = self.connections.write().await.remove(&connection.id);
                Err(PlatformError::connection("Channel closed"))
            }
            Err(_) => Ok(None),
        }
    }
}
