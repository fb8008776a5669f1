//! TikTok event relay protocol.
//!
//! TikTok's webcast feed is consumed through a local relay that re-publishes
//! LIVE events as JSON frames of the form `{"event": "...", "data": {...}}`.

use async_trait::async_trait;
use serde_json::Value;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::numeric_field;
use crate::error::Result;
use crate::event::PlatformEvent;
use crate::websocket::{SourceProtocol, WebSocketSource, WebSocketSourceConfig};

/// Default relay endpoint. `{user}` is replaced with the TikTok username.
pub const TIKTOK_RELAY_URL: &str = "ws://127.0.0.1:21213/?uniqueId={user}";

#[derive(Clone)]
pub struct TikTokProtocol {
    url_template: String,
}

impl Default for TikTokProtocol {
    fn default() -> Self {
        Self::new(TIKTOK_RELAY_URL)
    }
}

impl TikTokProtocol {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    fn parse_frame(text: &str) -> Result<Vec<PlatformEvent>> {
        let frame: Value = serde_json::from_str(text)?;
        let Some(kind) = frame.get("event").and_then(Value::as_str) else {
            return Ok(vec![]);
        };

        let event = match kind {
            "gift" => {
                let diamonds = numeric_field(frame.pointer("/data/diamondCount")).unwrap_or(0.0);
                PlatformEvent::Gift {
                    diamond_count: diamonds,
                }
            }
            "subscribe" => PlatformEvent::Subscribe,
            other => PlatformEvent::Other {
                kind: other.to_string(),
            },
        };
        Ok(vec![event])
    }
}

#[async_trait]
impl SourceProtocol for TikTokProtocol {
    fn platform(&self) -> &str {
        "tiktok"
    }

    async fn websocket_url(&self, identity: &str) -> Result<String> {
        let user = urlencoding::encode(identity.trim_start_matches('@'));
        Ok(self.url_template.replace("{user}", &user))
    }

    fn decode_message(&self, message: &Message, _identity: &str) -> Result<Vec<PlatformEvent>> {
        match message {
            Message::Text(text) => Self::parse_frame(text.as_str()),
            _ => Ok(vec![]),
        }
    }
}

/// Create a TikTok source against the given relay URL template.
pub fn create_tiktok_source(
    url_template: impl Into<String>,
    config: Option<WebSocketSourceConfig>,
) -> WebSocketSource<TikTokProtocol> {
    WebSocketSource::with_protocol(TikTokProtocol::new(url_template), config)
}
