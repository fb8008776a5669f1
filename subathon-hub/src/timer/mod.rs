//! Countdown state, the aggregator that mutates it, and time decay.

mod aggregator;
mod decay;
mod delta;
mod state;

pub use aggregator::{AdjustDirection, ApplyOutcome, EventAggregator};
pub use decay::{DECAY_CADENCE, DecayScheduler};
pub use delta::{DeltaKind, TimeDelta};
pub use state::TimerState;
