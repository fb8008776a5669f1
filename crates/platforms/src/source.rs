//! Platform source trait and connection types.
//!
//! Defines the interface every platform client implements. The hub only talks
//! to platforms through [`PlatformSource`], never through a concrete type.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::error::Result;
use crate::event::PlatformEvent;
use crate::websocket::WebSocketSourceConfig;

/// Transport-level state of a source connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Connected => 1,
            Self::Disconnected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Handle for an active event stream.
///
/// Cloning the handle is cheap; clones observe the same connection state.
#[derive(Debug, Clone)]
pub struct SourceConnection {
    /// Unique connection ID
    pub id: String,
    /// Platform identifier
    pub platform: String,
    /// Username or channel the connection is bound to
    pub identity: String,
    state: Arc<AtomicU8>,
    reconnect_count: Arc<AtomicU32>,
}

impl SourceConnection {
    /// Create a new connection handle in the `Connecting` state.
    pub fn new(
        id: impl Into<String>,
        platform: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            platform: platform.into(),
            identity: identity.into(),
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8())),
            reconnect_count: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Current transport state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Number of reconnect attempts since the last successful connect.
    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::SeqCst)
    }

    pub fn set_reconnect_count(&self, count: u32) {
        self.reconnect_count.store(count, Ordering::SeqCst);
    }
}

/// Configuration for establishing a source connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// WebSocket-specific overrides (reconnect policy, buffer size)
    pub websocket: Option<WebSocketSourceConfig>,
}

impl ConnectionConfig {
    /// Set WebSocket configuration.
    pub fn with_websocket(mut self, config: WebSocketSourceConfig) -> Self {
        self.websocket = Some(config);
        self
    }
}

/// Trait for platform-specific event sources.
#[async_trait]
pub trait PlatformSource: Send + Sync {
    /// Get the platform name this source handles.
    fn platform(&self) -> &str;

    /// Open an event stream for a username/channel.
    ///
    /// Returns as soon as the background connection is scheduled; the handle's
    /// state tracks the actual transport.
    async fn connect(&self, identity: &str, config: ConnectionConfig) -> Result<SourceConnection>;

    /// Close the event stream and cancel any pending reconnect.
    async fn disconnect(&self, connection: &mut SourceConnection) -> Result<()>;

    /// Receive the next event.
    ///
    /// Returns `Ok(None)` when nothing arrived within the poll window and an
    /// error once the connection is gone for good.
    async fn receive(&self, connection: &SourceConnection) -> Result<Option<PlatformEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_connection_state() {
        let conn = SourceConnection::new("conn1", "kick", "streamer");

        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.reconnect_count(), 0);

        let observer = conn.clone();
        conn.set_state(ConnectionState::Connected);
        assert_eq!(observer.state(), ConnectionState::Connected);

        conn.set_state(ConnectionState::Disconnected);
        assert_eq!(observer.state(), ConnectionState::Disconnected);

        conn.set_reconnect_count(3);
        assert_eq!(observer.reconnect_count(), 3);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }
}
