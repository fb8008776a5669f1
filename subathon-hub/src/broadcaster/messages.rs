//! WebSocket message envelope.
//!
//! Every frame is `{ "type": string, "payload": object }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Messages sent from the server to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "init")]
    Init(InitPayload),
    #[serde(rename = "timer")]
    Timer(TimerPayload),
    #[serde(rename = "event")]
    Event(EventPayload),
    #[serde(rename = "configApplied")]
    ConfigApplied(IdentitiesPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub remaining: i64,
    pub rules: Arc<Value>,
    pub tiktok_user: String,
    pub kick_channel: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimerPayload {
    pub remaining: i64,
}

/// A platform event that added time.
#[derive(Debug, Clone, Serialize)]
pub struct EventPayload {
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub add: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitiesPayload {
    pub tiktok_user: String,
    pub kick_channel: String,
}

/// Raw client frame before dispatch on `type`.
#[derive(Debug, Deserialize)]
struct ClientEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Commands accepted from subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// `manual:add`, `None` means the configured manual step.
    ManualAdd { seconds: Option<i64> },
    /// `manual:sub`, `None` means the configured manual step.
    ManualSub { seconds: Option<i64> },
    /// `config:update`. Only string fields are carried; other values are dropped.
    ConfigUpdate {
        tiktok_user: Option<String>,
        kick_channel: Option<String>,
    },
}

impl ClientCommand {
    /// Parse a client frame. Returns `None` for malformed or unknown frames.
    pub fn parse(raw: &str) -> Option<Self> {
        let envelope: ClientEnvelope = serde_json::from_str(raw).ok()?;

        match envelope.kind.as_str() {
            "manual:add" => Some(Self::ManualAdd {
                seconds: seconds_field(&envelope.payload)?,
            }),
            "manual:sub" => Some(Self::ManualSub {
                seconds: seconds_field(&envelope.payload)?,
            }),
            "config:update" => {
                let text = |key: &str| {
                    envelope
                        .payload
                        .get(key)
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string())
                };
                Some(Self::ConfigUpdate {
                    tiktok_user: text("tiktokUser"),
                    kick_channel: text("kickChannel"),
                })
            }
            _ => None,
        }
    }
}

/// `Some(None)` when `seconds` is absent or null, `None` when it is not a number.
fn seconds_field(payload: &Value) -> Option<Option<i64>> {
    match payload.get("seconds") {
        None | Some(Value::Null) => Some(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .map(Some),
        Some(_) => None,
    }
}
