//! The single writer of the countdown.
//!
//! Every mutation (platform events, manual commands, decay) goes through
//! [`EventAggregator`], which holds the state lock across the read, the clamp,
//! the write and the resulting broadcast. Subscribers therefore observe
//! notifications in exactly the order the mutations were applied.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::delta::{DeltaKind, TimeDelta};
use super::state::TimerState;
use crate::broadcaster::{Broadcaster, EventPayload, ServerMessage, Subscription, TimerPayload};
use crate::config::RuleSet;

/// Direction of a manual adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustDirection {
    Add,
    Subtract,
}

/// Result of applying a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Countdown value after clamping.
    pub remaining: i64,
    /// Whether clamping altered the raw sum.
    pub clamped: bool,
}

pub struct EventAggregator {
    rules: Arc<RuleSet>,
    state: Mutex<TimerState>,
    broadcaster: Broadcaster,
}

impl EventAggregator {
    /// Create an aggregator starting at `rules.base_seconds`.
    pub fn new(rules: Arc<RuleSet>, broadcaster: Broadcaster) -> Self {
        let state = TimerState::new(rules.base_seconds, Instant::now());
        Self {
            rules,
            state: Mutex::new(state),
            broadcaster,
        }
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Current countdown value.
    pub fn remaining(&self) -> i64 {
        self.state.lock().remaining()
    }

    /// Apply a delta and notify subscribers.
    pub fn apply(&self, delta: TimeDelta) -> ApplyOutcome {
        let mut state = self.state.lock();
        self.apply_locked(&mut state, &delta)
    }

    /// Apply an operator adjustment. `None` uses the configured manual step.
    pub fn manual_adjust(&self, seconds: Option<i64>, direction: AdjustDirection) -> i64 {
        let seconds = seconds.unwrap_or(self.rules.manual_step);
        let delta = match direction {
            AdjustDirection::Add => TimeDelta::new("manual", DeltaKind::ManualAdd, seconds),
            AdjustDirection::Subtract => {
                TimeDelta::new("manual", DeltaKind::ManualSub, seconds.saturating_neg())
            }
        };
        self.apply(delta).remaining
    }

    /// Convert whole seconds elapsed since the last tick into decay.
    ///
    /// Returns `None` while less than a full second has passed. The decay
    /// amount is truncated to whole seconds on every emission.
    pub fn decay_tick(&self, now: Instant) -> Option<ApplyOutcome> {
        let mut state = self.state.lock();
        let elapsed = state.take_elapsed_secs(now);
        if elapsed == 0 {
            return None;
        }

        let amount = (elapsed as f64 * self.rules.decay_seconds_per_second).trunc() as i64;
        let delta = TimeDelta::new("decay", DeltaKind::Decay, amount.saturating_neg());
        Some(self.apply_locked(&mut state, &delta))
    }

    /// Register a subscriber whose first message is built from the current value.
    ///
    /// Registration happens under the state lock, so the subscriber sees every
    /// later mutation and none that the initial message already reflects.
    pub fn subscribe_with<F>(&self, make_initial: F) -> Subscription
    where
        F: FnOnce(i64) -> ServerMessage,
    {
        let state = self.state.lock();
        let initial = make_initial(state.remaining());
        self.broadcaster.register(&initial)
    }

    fn apply_locked(&self, state: &mut TimerState, delta: &TimeDelta) -> ApplyOutcome {
        let clamped = state.add_clamped(delta.amount_seconds, self.rules.max_seconds);
        let remaining = state.remaining();

        if delta.kind.is_platform_event() {
            debug!(
                platform = %delta.source_tag,
                kind = %delta.kind,
                amount = delta.amount_seconds,
                remaining,
                "Applied platform event"
            );
            self.broadcaster.notify(&ServerMessage::Event(EventPayload {
                platform: delta.source_tag.clone(),
                kind: delta.kind.as_str().to_string(),
                add: delta.amount_seconds,
            }));
        } else {
            trace!(
                source = %delta.source_tag,
                kind = %delta.kind,
                amount = delta.amount_seconds,
                remaining,
                clamped,
                "Applied delta"
            );
        }
        self.broadcaster
            .notify(&ServerMessage::Timer(TimerPayload { remaining }));

        ApplyOutcome { remaining, clamped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::Frame;
    use crate::config::sample_rules;
    use proptest::prelude::*;
    use std::time::Duration;

    fn aggregator() -> EventAggregator {
        EventAggregator::new(Arc::new(sample_rules()), Broadcaster::new())
    }

    fn parse(frame: Frame) -> serde_json::Value {
        serde_json::from_str(&frame).unwrap()
    }

    fn timer_init(remaining: i64) -> ServerMessage {
        ServerMessage::Timer(TimerPayload { remaining })
    }

    #[test]
    fn test_starts_at_base_seconds() {
        assert_eq!(aggregator().remaining(), 3600);
    }

    #[test]
    fn test_apply_clamps_and_reports() {
        let agg = aggregator();

        let outcome = agg.apply(TimeDelta::new("kick", DeltaKind::Sub, 120));
        assert_eq!(outcome, ApplyOutcome { remaining: 3720, clamped: false });

        let outcome = agg.apply(TimeDelta::new("kick", DeltaKind::Coins, 100_000));
        assert_eq!(outcome, ApplyOutcome { remaining: 7200, clamped: true });

        let outcome = agg.apply(TimeDelta::new("manual", DeltaKind::ManualSub, -100_000));
        assert_eq!(outcome, ApplyOutcome { remaining: 0, clamped: true });
    }

    #[test]
    fn test_manual_adjust_uses_step_by_default() {
        let agg = aggregator();
        assert_eq!(agg.manual_adjust(None, AdjustDirection::Add), 3660);
        assert_eq!(agg.manual_adjust(None, AdjustDirection::Subtract), 3600);
        assert_eq!(agg.manual_adjust(Some(100), AdjustDirection::Subtract), 3500);
    }

    #[test]
    fn test_manual_add_past_max_lands_on_max() {
        let agg = aggregator();
        agg.manual_adjust(Some(10_000), AdjustDirection::Subtract);
        assert_eq!(agg.remaining(), 0);

        let max = agg.rules().max_seconds;
        assert_eq!(agg.manual_adjust(Some(max * 2), AdjustDirection::Add), max);
    }

    #[test]
    fn test_platform_delta_broadcasts_event_then_timer() {
        let agg = aggregator();
        let mut sub = agg.subscribe_with(timer_init);
        sub.try_recv();

        agg.apply(TimeDelta::new("tiktok", DeltaKind::Gift, 50));

        let event = parse(sub.try_recv().unwrap());
        assert_eq!(event["type"], "event");
        assert_eq!(event["payload"]["platform"], "tiktok");
        assert_eq!(event["payload"]["type"], "gift");
        assert_eq!(event["payload"]["add"], 50);

        let timer = parse(sub.try_recv().unwrap());
        assert_eq!(timer["type"], "timer");
        assert_eq!(timer["payload"]["remaining"], 3650);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_manual_delta_broadcasts_timer_only() {
        let agg = aggregator();
        let mut sub = agg.subscribe_with(timer_init);
        sub.try_recv();

        agg.manual_adjust(Some(5), AdjustDirection::Add);

        let timer = parse(sub.try_recv().unwrap());
        assert_eq!(timer["type"], "timer");
        assert_eq!(timer["payload"]["remaining"], 3605);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_subscribe_sees_current_value() {
        let agg = aggregator();
        agg.manual_adjust(Some(42), AdjustDirection::Add);

        let mut sub = agg.subscribe_with(timer_init);
        let init = parse(sub.try_recv().unwrap());
        assert_eq!(init["payload"]["remaining"], 3642);
    }

    #[test]
    fn test_decay_tick_whole_seconds_only() {
        let agg = aggregator();
        let start = agg.state.lock().last_tick();

        assert_eq!(agg.decay_tick(start + Duration::from_millis(600)), None);
        assert_eq!(agg.remaining(), 3600);

        let outcome = agg.decay_tick(start + Duration::from_millis(1200)).unwrap();
        assert_eq!(outcome.remaining, 3599);

        // Same instant again: nothing new has elapsed.
        assert_eq!(agg.decay_tick(start + Duration::from_millis(1200)), None);

        let outcome = agg.decay_tick(start + Duration::from_millis(10_000)).unwrap();
        assert_eq!(outcome.remaining, 3590);
    }

    #[test]
    fn test_decay_truncates_fractional_rate_per_tick() {
        let mut rules = sample_rules();
        rules.decay_seconds_per_second = 1.5;
        let agg = EventAggregator::new(Arc::new(rules), Broadcaster::new());
        let start = agg.state.lock().last_tick();

        // 1 * 1.5 truncates to 1
        agg.decay_tick(start + Duration::from_secs(1));
        assert_eq!(agg.remaining(), 3599);

        // 3 * 1.5 = 4.5 truncates to 4
        agg.decay_tick(start + Duration::from_secs(4));
        assert_eq!(agg.remaining(), 3595);
    }

    #[test]
    fn test_decay_stops_at_zero() {
        let agg = aggregator();
        let start = agg.state.lock().last_tick();

        let outcome = agg.decay_tick(start + Duration::from_secs(10_000)).unwrap();
        assert_eq!(outcome, ApplyOutcome { remaining: 0, clamped: true });
    }

    #[test]
    fn test_scenario_gift_idle_then_manual_sub() {
        let agg = aggregator();
        let start = agg.state.lock().last_tick();

        agg.apply(TimeDelta::new("tiktok", DeltaKind::Gift, 50));
        assert_eq!(agg.remaining(), 3650);

        agg.decay_tick(start + Duration::from_secs(10));
        assert_eq!(agg.remaining(), 3640);

        assert_eq!(agg.manual_adjust(Some(5000), AdjustDirection::Subtract), 0);
    }

    proptest! {
        #[test]
        fn prop_remaining_stays_in_bounds(amounts in proptest::collection::vec(-20_000i64..20_000, 1..64)) {
            let agg = aggregator();
            let max = agg.rules().max_seconds;
            for amount in amounts {
                let outcome = agg.apply(TimeDelta::new("manual", DeltaKind::ManualAdd, amount));
                prop_assert!(outcome.remaining >= 0 && outcome.remaining <= max);
                prop_assert_eq!(outcome.remaining, agg.remaining());
            }
        }
    }
}
