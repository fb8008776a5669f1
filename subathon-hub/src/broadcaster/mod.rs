//! Fan-out of timer state to connected subscribers.
//!
//! The broadcaster keeps a non-owning registry of subscriber queues. The
//! transport layer owns each subscriber's receiving end; when it goes away the
//! entry is pruned on the next delivery.

mod messages;

pub use messages::{
    ClientCommand, EventPayload, IdentitiesPayload, InitPayload, ServerMessage, TimerPayload,
};

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Outbound queue depth per subscriber.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// Identifier of a connected subscriber.
pub type SubscriberId = u64;

/// A serialized frame ready to be written to a transport.
pub type Frame = Arc<str>;

struct Inner {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Frame>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Broadcaster for timer notifications.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

/// The receiving end of a subscriber registration.
///
/// Dropping it removes the subscriber from the broadcaster.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Frame>,
    inner: Arc<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Take a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner.subscribers.remove(&self.id);
    }
}

impl Broadcaster {
    /// Create a new broadcaster with the default queue capacity.
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Create a new broadcaster with the given per-subscriber queue capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Register a subscriber whose queue starts with `first`.
    pub fn register(&self, first: &ServerMessage) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, receiver) = mpsc::channel(self.inner.capacity);

        if let Some(frame) = encode(first) {
            // Fresh queue, cannot be full.
            let _ = tx.try_send(frame);
        }
        self.inner.subscribers.insert(id, tx);
        debug!(subscriber_id = id, "Subscriber connected");

        Subscription {
            id,
            receiver,
            inner: self.inner.clone(),
        }
    }

    /// Serialize once and deliver to every writable subscriber.
    ///
    /// Subscribers whose queue is full are skipped for this message. Returns
    /// the number of subscribers that received it.
    pub fn notify(&self, message: &ServerMessage) -> usize {
        let Some(frame) = encode(message) else {
            return 0;
        };

        let targets: Vec<(SubscriberId, mpsc::Sender<Frame>)> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(subscriber_id = id, "Subscriber not writable, skipping");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.inner.subscribers.remove(&id);
                }
            }
        }
        delivered
    }

    /// Deliver a message to a single subscriber.
    pub fn send_to(&self, id: SubscriberId, message: &ServerMessage) -> bool {
        let Some(tx) = self.inner.subscribers.get(&id).map(|e| e.value().clone()) else {
            return false;
        };
        let Some(frame) = encode(message) else {
            return false;
        };
        tx.try_send(frame).is_ok()
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

fn encode(message: &ServerMessage) -> Option<Frame> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize message");
            None
        }
    }
}
