//! Service container for dependency injection.
//!
//! The ServiceContainer holds the single countdown, the subscriber broadcaster
//! and the per-platform adapters, and routes subscriber commands to them.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use subathon_platforms::{
    ConnectionConfig, PlatformSource, WebSocketSourceConfig, create_kick_source,
    create_tiktok_source, tls::install_rustls_provider,
};

use crate::Result;
use crate::broadcaster::{
    Broadcaster, ClientCommand, IdentitiesPayload, InitPayload, ServerMessage, SubscriberId,
    Subscription,
};
use crate::config::{AppConfig, RECONNECT_DELAY, RuleSet};
use crate::platform::{Platform, PlatformAdapter};
use crate::timer::{AdjustDirection, DecayScheduler, EventAggregator};

/// Default shutdown timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot served by `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    pub tiktok_user: String,
    pub kick_channel: String,
    pub remaining: i64,
}

/// Service container holding all hub services.
pub struct ServiceContainer {
    /// Rules the hub was started with.
    pub rules: Arc<RuleSet>,
    rules_document: Arc<Value>,
    /// Subscriber registry.
    pub broadcaster: Broadcaster,
    /// Single writer of the countdown.
    pub aggregator: Arc<EventAggregator>,
    /// TikTok adapter.
    pub tiktok: Arc<PlatformAdapter>,
    /// Kick adapter.
    pub kick: Arc<PlatformAdapter>,
    decay_task: Mutex<Option<JoinHandle<()>>>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Create a container with WebSocket platform sources built from `config`.
    pub fn new(rules: RuleSet, config: &AppConfig) -> Self {
        install_rustls_provider();

        let tiktok_source: Arc<dyn PlatformSource> =
            Arc::new(create_tiktok_source(config.tiktok_relay_url.clone(), None));
        let kick_source: Arc<dyn PlatformSource> =
            Arc::new(create_kick_source(config.kick_ws_url.clone(), None));

        Self::assemble(
            rules,
            (tiktok_source, connection_config(config.tiktok_reconnect)),
            (kick_source, connection_config(config.kick_reconnect)),
        )
    }

    /// Create a container over arbitrary platform sources.
    pub fn with_sources(
        rules: RuleSet,
        tiktok_source: Arc<dyn PlatformSource>,
        kick_source: Arc<dyn PlatformSource>,
    ) -> Self {
        Self::assemble(
            rules,
            (tiktok_source, ConnectionConfig::default()),
            (kick_source, ConnectionConfig::default()),
        )
    }

    fn assemble(
        rules: RuleSet,
        (tiktok_source, tiktok_config): (Arc<dyn PlatformSource>, ConnectionConfig),
        (kick_source, kick_config): (Arc<dyn PlatformSource>, ConnectionConfig),
    ) -> Self {
        info!("Initializing service container");

        let rules_document = rules.document();
        let rules = Arc::new(rules);
        let broadcaster = Broadcaster::new();
        let aggregator = Arc::new(EventAggregator::new(rules.clone(), broadcaster.clone()));

        let tiktok = Arc::new(PlatformAdapter::new(
            Platform::TikTok,
            tiktok_source,
            tiktok_config,
            aggregator.clone(),
        ));
        let kick = Arc::new(PlatformAdapter::new(
            Platform::Kick,
            kick_source,
            kick_config,
            aggregator.clone(),
        ));

        Self {
            rules,
            rules_document,
            broadcaster,
            aggregator,
            tiktok,
            kick,
            decay_task: Mutex::new(None),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start decay and point the adapters at their boot identities.
    pub async fn start(&self, tiktok_user: &str, kick_channel: &str) {
        self.start_decay(DecayScheduler::new(self.aggregator.clone()));
        tokio::join!(
            self.tiktok.set_identity(tiktok_user),
            self.kick.set_identity(kick_channel),
        );
        info!(
            tiktok = %self.tiktok.status(),
            kick = %self.kick.status(),
            remaining = self.aggregator.remaining(),
            "Services started"
        );
    }

    /// Spawn a decay scheduler bound to this container's lifetime.
    pub fn start_decay(&self, scheduler: DecayScheduler) {
        let handle = scheduler.spawn(self.cancellation_token.child_token());
        if let Some(previous) = self.decay_task.lock().replace(handle) {
            warn!("Decay scheduler restarted");
            previous.abort();
        }
    }

    /// Identities the adapters currently target.
    pub fn identities(&self) -> IdentitiesPayload {
        IdentitiesPayload {
            tiktok_user: self.tiktok.identity(),
            kick_channel: self.kick.identity(),
        }
    }

    pub fn status(&self) -> HubStatus {
        let identities = self.identities();
        HubStatus {
            tiktok_user: identities.tiktok_user,
            kick_channel: identities.kick_channel,
            remaining: self.aggregator.remaining(),
        }
    }

    /// Register a subscriber. Its first frame is `init` with the current value.
    pub fn connect_subscriber(&self) -> Subscription {
        let identities = self.identities();
        let rules = self.rules_document.clone();
        self.aggregator.subscribe_with(move |remaining| {
            ServerMessage::Init(InitPayload {
                remaining,
                rules,
                tiktok_user: identities.tiktok_user,
                kick_channel: identities.kick_channel,
            })
        })
    }

    /// Dispatch one inbound frame from `subscriber`.
    ///
    /// Returns `false` when the frame was malformed or unknown and therefore
    /// ignored.
    pub async fn handle_command(&self, subscriber: SubscriberId, raw: &str) -> bool {
        let Some(command) = ClientCommand::parse(raw) else {
            debug!(subscriber_id = subscriber, "Ignoring malformed client frame");
            return false;
        };

        match command {
            ClientCommand::ManualAdd { seconds } => {
                let remaining = self.aggregator.manual_adjust(seconds, AdjustDirection::Add);
                info!(subscriber_id = subscriber, ?seconds, remaining, "Manual add");
            }
            ClientCommand::ManualSub { seconds } => {
                let remaining = self
                    .aggregator
                    .manual_adjust(seconds, AdjustDirection::Subtract);
                info!(subscriber_id = subscriber, ?seconds, remaining, "Manual subtract");
            }
            ClientCommand::ConfigUpdate {
                tiktok_user,
                kick_channel,
            } => {
                if let Some(user) = tiktok_user {
                    self.tiktok.set_identity(&user).await;
                }
                if let Some(channel) = kick_channel {
                    self.kick.set_identity(&channel).await;
                }

                let identities = self.identities();
                info!(
                    subscriber_id = subscriber,
                    tiktok = %identities.tiktok_user,
                    kick = %identities.kick_channel,
                    "Identities updated"
                );
                self.broadcaster
                    .send_to(subscriber, &ServerMessage::ConfigApplied(identities));
            }
        }
        true
    }

    /// Shutdown all services gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Shutdown all services gracefully with a custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);

        // Signal all background tasks to stop
        self.cancellation_token.cancel();

        let decay_task = self.decay_task.lock().take();
        let shutdown_result = tokio::time::timeout(timeout, async {
            if let Some(task) = decay_task
                && let Err(e) = task.await
            {
                debug!(error = %e, "Decay scheduler did not exit cleanly");
            }
            tokio::join!(self.tiktok.set_identity(""), self.kick.set_identity(""));
        })
        .await;

        if shutdown_result.is_err() {
            warn!("Shutdown timeout reached, forcing shutdown");
        }

        info!("Services shut down");
        Ok(())
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}

fn connection_config(reconnect: bool) -> ConnectionConfig {
    ConnectionConfig::default().with_websocket(
        WebSocketSourceConfig::default()
            .with_reconnect(reconnect)
            .with_reconnect_delay(RECONNECT_DELAY),
    )
}
