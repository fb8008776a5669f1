//! Per-platform connection lifecycle.
//!
//! A [`PlatformAdapter`] owns at most one live connection. Changing the
//! identity tears the previous connection down before the new one is opened,
//! and the runner that fed the old connection into the aggregator is awaited
//! first, so nothing received under a previous identity is applied after the
//! switch.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use subathon_platforms::{ConnectionConfig, ConnectionState, PlatformSource, SourceConnection};

use super::conversion::{Platform, PlatformRates};
use crate::timer::EventAggregator;

/// Externally visible adapter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterStatus {
    /// No identity configured
    Disabled,
    Connecting,
    Connected,
    /// Identity configured but no live stream
    Disconnected,
}

impl fmt::Display for AdapterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl From<ConnectionState> for AdapterStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Connected => Self::Connected,
            ConnectionState::Disconnected => Self::Disconnected,
        }
    }
}

struct Target {
    identity: String,
    connection: Option<SourceConnection>,
    pending: AdapterStatus,
}

struct ActiveConnection {
    connection: SourceConnection,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct PlatformAdapter {
    platform: Platform,
    source: Arc<dyn PlatformSource>,
    connection_config: ConnectionConfig,
    rates: PlatformRates,
    aggregator: Arc<EventAggregator>,
    current: RwLock<Target>,
    active: Mutex<Option<ActiveConnection>>,
}

impl PlatformAdapter {
    pub fn new(
        platform: Platform,
        source: Arc<dyn PlatformSource>,
        connection_config: ConnectionConfig,
        aggregator: Arc<EventAggregator>,
    ) -> Self {
        let rates = PlatformRates::for_platform(platform, aggregator.rules());
        Self {
            platform,
            source,
            connection_config,
            rates,
            aggregator,
            current: RwLock::new(Target {
                identity: String::new(),
                connection: None,
                pending: AdapterStatus::Disabled,
            }),
            active: Mutex::new(None),
        }
    }

    /// Identity currently targeted; empty when disabled.
    pub fn identity(&self) -> String {
        self.current.read().identity.clone()
    }

    pub fn status(&self) -> AdapterStatus {
        let current = self.current.read();
        match &current.connection {
            Some(connection) => connection.state().into(),
            None => current.pending,
        }
    }

    /// Retarget the adapter.
    ///
    /// Any existing connection is torn down first; teardown failures are
    /// logged and ignored. An empty (or all-whitespace) identity leaves the
    /// adapter disabled. Connect failures are logged and leave the adapter
    /// disconnected; they never surface to the caller.
    pub async fn set_identity(&self, identity: &str) {
        let identity = identity.trim();
        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        {
            let mut current = self.current.write();
            current.identity = identity.to_string();
            current.connection = None;
            current.pending = if identity.is_empty() {
                AdapterStatus::Disabled
            } else {
                AdapterStatus::Connecting
            };
        }

        if identity.is_empty() {
            info!(platform = %self.platform, "Adapter disabled");
            return;
        }

        info!(platform = %self.platform, identity, "Connecting");
        let connection = match self
            .source
            .connect(identity, self.connection_config.clone())
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                warn!(platform = %self.platform, identity, error = %e, "Failed to connect");
                self.current.write().pending = AdapterStatus::Disconnected;
                return;
            }
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            self.platform,
            self.source.clone(),
            connection.clone(),
            self.rates,
            self.aggregator.clone(),
            cancel.clone(),
        ));

        self.current.write().connection = Some(connection.clone());
        *active = Some(ActiveConnection {
            connection,
            cancel,
            task,
        });
    }

    async fn teardown(&self, previous: ActiveConnection) {
        let ActiveConnection {
            mut connection,
            cancel,
            task,
        } = previous;

        cancel.cancel();
        if let Err(e) = task.await
            && e.is_panic()
        {
            warn!(platform = %self.platform, "Event runner panicked");
        }

        debug!(
            platform = %self.platform,
            identity = %connection.identity,
            "Tearing down connection"
        );
        if let Err(e) = self.source.disconnect(&mut connection).await {
            debug!(
                platform = %self.platform,
                identity = %connection.identity,
                error = %e,
                "Ignoring teardown failure"
            );
        }
    }
}

async fn run_connection(
    platform: Platform,
    source: Arc<dyn PlatformSource>,
    connection: SourceConnection,
    rates: PlatformRates,
    aggregator: Arc<EventAggregator>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = source.receive(&connection) => match result {
                Ok(Some(event)) => match rates.to_delta(platform, &event) {
                    Some(delta) => {
                        aggregator.apply(delta);
                    }
                    None => trace!(%platform, event = event.name(), "Event adds no time"),
                },
                Ok(None) => {}
                Err(e) => {
                    info!(
                        %platform,
                        identity = %connection.identity,
                        reconnects = connection.reconnect_count(),
                        error = %e,
                        "Event stream ended"
                    );
                    connection.set_state(ConnectionState::Disconnected);
                    break;
                }
            },
        }
    }
}
