//! Concrete platform protocols.

pub mod kick;
pub mod tiktok;

pub use kick::{KICK_WS_URL, KickProtocol, create_kick_source};
pub use tiktok::{TIKTOK_RELAY_URL, TikTokProtocol, create_tiktok_source};

use serde_json::Value;

/// Read a numeric field that platforms send either as a JSON number or a string.
pub(crate) fn numeric_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
