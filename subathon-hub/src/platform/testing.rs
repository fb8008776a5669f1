//! In-memory platform source for exercising adapters without network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

use subathon_platforms::{
    ConnectionConfig, ConnectionState, PlatformError, PlatformEvent, PlatformSource,
    SourceConnection,
};

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<PlatformEvent>>>;

struct Link {
    identity: String,
    sender: mpsc::Sender<PlatformEvent>,
}

/// A [`PlatformSource`] fed by [`ChannelSource::emit`].
pub struct ChannelSource {
    platform: String,
    links: Mutex<HashMap<String, Link>>,
    receivers: Mutex<HashMap<String, SharedReceiver>>,
    connects: Mutex<Vec<String>>,
    disconnects: Mutex<Vec<String>>,
    fail_disconnect: AtomicBool,
}

impl ChannelSource {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            links: Mutex::new(HashMap::new()),
            receivers: Mutex::new(HashMap::new()),
            connects: Mutex::new(Vec::new()),
            disconnects: Mutex::new(Vec::new()),
            fail_disconnect: AtomicBool::new(false),
        }
    }

    /// Push an event to every open connection bound to `identity`.
    ///
    /// Returns the number of connections that accepted it.
    pub fn emit(&self, identity: &str, event: PlatformEvent) -> usize {
        let senders: Vec<_> = self
            .links
            .lock()
            .values()
            .filter(|link| link.identity == identity)
            .map(|link| link.sender.clone())
            .collect();
        senders
            .into_iter()
            .filter(|tx| tx.try_send(event.clone()).is_ok())
            .count()
    }

    /// Simulate the platform closing every connection bound to `identity`.
    pub fn close(&self, identity: &str) {
        self.links.lock().retain(|_, link| link.identity != identity);
    }

    /// Make `disconnect` report a failure without closing anything.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Identities passed to `connect`, in order.
    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }

    /// Identities passed to `disconnect`, in order.
    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().clone()
    }
}

#[async_trait]
impl PlatformSource for ChannelSource {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn connect(
        &self,
        identity: &str,
        _config: ConnectionConfig,
    ) -> subathon_platforms::Result<SourceConnection> {
        let id = format!(
            "{}-{}-{}",
            self.platform,
            identity,
            self.connects.lock().len() + 1
        );
        let (sender, receiver) = mpsc::channel(32);

        self.links.lock().insert(
            id.clone(),
            Link {
                identity: identity.to_string(),
                sender,
            },
        );
        self.receivers
            .lock()
            .insert(id.clone(), Arc::new(tokio::sync::Mutex::new(receiver)));
        self.connects.lock().push(identity.to_string());

        let connection = SourceConnection::new(id, self.platform.clone(), identity);
        connection.set_state(ConnectionState::Connected);
        Ok(connection)
    }

    async fn disconnect(&self, connection: &mut SourceConnection) -> subathon_platforms::Result<()> {
        self.disconnects.lock().push(connection.identity.clone());
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(PlatformError::connection("simulated teardown failure"));
        }

        self.links.lock().remove(&connection.id);
        self.receivers.lock().remove(&connection.id);
        connection.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    async fn receive(
        &self,
        connection: &SourceConnection,
    ) -> subathon_platforms::Result<Option<PlatformEvent>> {
        let receiver = self.receivers.lock().get(&connection.id).cloned();
        let Some(receiver) = receiver else {
            return Err(PlatformError::connection("Connection not found"));
        };

        let mut receiver = receiver.lock().await;
        match tokio::time::timeout(Duration::from_millis(20), receiver.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                connection.set_state(ConnectionState::Disconnected);
                Err(PlatformError::connection("Channel closed"))
            }
            Err(_) => Ok(None),
        }
    }
}
