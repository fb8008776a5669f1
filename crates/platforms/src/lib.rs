//! Live event sources for subathon timers.
//!
//! This crate connects to streaming platform chat/event feeds and yields typed
//! monetization events (gifts, subscriptions, paid messages).
//!
//! ## Core Types
//!
//! - [`PlatformEvent`] - A normalized monetization event
//! - [`PlatformSource`] - Trait for platform-specific connection clients
//! - [`SourceConnection`] - Handle for an active event stream
//!
//! ## Sources
//!
//! - [`WebSocketSource`] - Generic WebSocket source driven by a [`SourceProtocol`]
//! - [`providers::TikTokProtocol`] - TikTok event relay protocol
//! - [`providers::KickProtocol`] - Kick chat protocol

pub mod error;
pub mod event;
pub mod providers;
pub mod source;
pub mod tls;
pub mod websocket;

pub use error::{PlatformError, Result};
pub use event::PlatformEvent;
pub use providers::{
    KICK_WS_URL, KickProtocol, TIKTOK_RELAY_URL, TikTokProtocol, create_kick_source,
    create_tiktok_source,
};
pub use source::{ConnectionConfig, ConnectionState, PlatformSource, SourceConnection};
pub use websocket::{SourceProtocol, WebSocketSource, WebSocketSourceConfig};
