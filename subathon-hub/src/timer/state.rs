use std::time::Duration;
use tokio::time::Instant;

/// The shared countdown value and its decay clock.
///
/// `remaining` is always within `[0, max_seconds]`; every mutation clamps.
#[derive(Debug, Clone)]
pub struct TimerState {
    remaining: i64,
    last_tick: Instant,
}

impl TimerState {
    pub fn new(remaining: i64, now: Instant) -> Self {
        Self {
            remaining: remaining.max(0),
            last_tick: now,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn last_tick(&self) -> Instant {
        self.last_tick
    }

    /// Add `amount` and clamp into `[0, max_seconds]`.
    ///
    /// Returns `true` when clamping changed the raw sum.
    pub fn add_clamped(&mut self, amount: i64, max_seconds: i64) -> bool {
        let candidate = self.remaining.saturating_add(amount);
        self.remaining = candidate.clamp(0, max_seconds.max(0));
        self.remaining != candidate
    }

    /// Consume whole elapsed seconds since the last tick.
    ///
    /// The decay clock advances by exactly the returned number of seconds, so
    /// the sub-second remainder carries over to the next call.
    pub fn take_elapsed_secs(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.last_tick).as_secs();
        if elapsed > 0 {
            self.last_tick += Duration::from_secs(elapsed);
        }
        elapsed
    }
}
