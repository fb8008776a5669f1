use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::aggregator::EventAggregator;

/// How often elapsed time is checked. Decay itself is applied per whole second.
pub const DECAY_CADENCE: Duration = Duration::from_millis(200);

/// Background task that turns wall-clock time into decay.
pub struct DecayScheduler {
    aggregator: Arc<EventAggregator>,
    cadence: Duration,
}

impl DecayScheduler {
    pub fn new(aggregator: Arc<EventAggregator>) -> Self {
        Self::with_cadence(aggregator, DECAY_CADENCE)
    }

    pub fn with_cadence(aggregator: Arc<EventAggregator>, cadence: Duration) -> Self {
        Self {
            aggregator,
            cadence,
        }
    }

    /// Spawn the scheduler. It runs until `cancel_token` is cancelled.
    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel_token).await })
    }

    async fn run(self, cancel_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.cadence);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            cadence_ms = self.cadence.as_millis() as u64,
            rate = self.aggregator.rules().decay_seconds_per_second,
            "Decay scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Decay scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.aggregator.decay_tick(Instant::now());
                }
            }
        }
    }
}
