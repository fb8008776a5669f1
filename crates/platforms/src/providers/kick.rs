//! Kick chat protocol.
//!
//! Kick's chat socket speaks Phoenix channels: join `channel:<name>` once the
//! socket opens, keep it alive with `phoenix` heartbeats, and read monetization
//! events by their `event` name.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::numeric_field;
use crate::error::Result;
use crate::event::PlatformEvent;
use crate::websocket::{SourceProtocol, WebSocketSource, WebSocketSourceConfig};

/// Default Kick chat WebSocket endpoint.
pub const KICK_WS_URL: &str = "wss://chat.kick.com/ws";

/// Phoenix closes idle sockets after 60 seconds.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct KickProtocol {
    url: String,
}

impl Default for KickProtocol {
    fn default() -> Self {
        Self::new(KICK_WS_URL)
    }
}

impl KickProtocol {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    fn join_message(channel: &str) -> Message {
        let join = json!({
            "event": "phx_join",
            "topic": format!("channel:{channel}"),
            "payload": {},
            "ref": 1,
        });
        Message::Text(join.to_string().into())
    }

    fn parse_frame(text: &str) -> Result<Vec<PlatformEvent>> {
        let frame: Value = serde_json::from_str(text)?;
        let Some(kind) = frame.get("event").and_then(Value::as_str) else {
            return Ok(vec![]);
        };

        let event = match kind {
            "subscription" => PlatformEvent::Subscribe,
            "gifted_subs" => {
                let count = numeric_field(frame.pointer("/payload/count"))
                    .filter(|n| *n >= 1.0)
                    .map(|n| n.trunc() as u64);
                PlatformEvent::GiftedSubs { count }
            }
            "paid_message" | "sticker" => PlatformEvent::Coins {
                amount: numeric_field(frame.pointer("/payload/amount")).unwrap_or(0.0),
            },
            other => PlatformEvent::Other {
                kind: other.to_string(),
            },
        };
        Ok(vec![event])
    }
}

#[async_trait]
impl SourceProtocol for KickProtocol {
    fn platform(&self) -> &str {
        "kick"
    }

    async fn websocket_url(&self, _channel: &str) -> Result<String> {
        Ok(self.url.clone())
    }

    fn headers(&self, _channel: &str) -> Vec<(String, String)> {
        vec![("Origin".to_string(), "https://kick.com".to_string())]
    }

    async fn handshake_messages(&self, channel: &str) -> Result<Vec<Message>> {
        Ok(vec![Self::join_message(channel)])
    }

    fn heartbeat_message(&self) -> Option<Message> {
        let heartbeat = json!({
            "topic": "phoenix",
            "event": "heartbeat",
            "payload": {},
            "ref": "hb",
        });
        Some(Message::Text(heartbeat.to_string().into()))
    }

    fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(HEARTBEAT_INTERVAL_SECS)
    }

    fn decode_message(&self, message: &Message, _channel: &str) -> Result<Vec<PlatformEvent>> {
        match message {
            Message::Text(text) => Self::parse_frame(text.as_str()),
            _ => Ok(vec![]),
        }
    }
}

/// Create a Kick source against the given chat endpoint.
pub fn create_kick_source(
    url: impl Into<String>,
    config: Option<WebSocketSourceConfig>,
) -> WebSocketSource<KickProtocol> {
    WebSocketSource::with_protocol(KickProtocol::new(url), config)
}
