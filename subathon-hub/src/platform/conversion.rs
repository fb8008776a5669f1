//! Event-to-seconds conversion.
//!
//! Automated platform sources only ever add time. Gift and coin events whose
//! converted amount is not positive produce no delta; subscriptions always
//! produce one, even when configured at zero seconds.

use std::fmt;

use subathon_platforms::PlatformEvent;

use crate::config::RuleSet;
use crate::timer::{DeltaKind, TimeDelta};

/// Platforms the hub follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    TikTok,
    Kick,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TikTok => "tiktok",
            Self::Kick => "kick",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform's slice of the rule set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformRates {
    /// Seconds per gift diamond / paid-message coin
    pub coin_to_seconds: f64,
    /// Seconds per subscription
    pub sub_seconds: i64,
    /// Seconds per gifted subscription, `None` where the platform has none
    pub gifted_sub_seconds: Option<i64>,
}

impl PlatformRates {
    pub fn for_platform(platform: Platform, rules: &RuleSet) -> Self {
        match platform {
            Platform::TikTok => Self {
                coin_to_seconds: rules.tiktok.coin_to_seconds,
                sub_seconds: rules.tiktok.sub_seconds,
                gifted_sub_seconds: None,
            },
            Platform::Kick => Self {
                coin_to_seconds: rules.kick.kick_coin_to_seconds,
                sub_seconds: rules.kick.subscription_seconds,
                gifted_sub_seconds: Some(rules.kick.gifted_sub_seconds),
            },
        }
    }

    /// Map a platform event to a delta, or `None` if it adds no time.
    pub fn to_delta(&self, platform: Platform, event: &PlatformEvent) -> Option<TimeDelta> {
        let (kind, amount) = match event {
            PlatformEvent::Gift { diamond_count } => {
                let amount = coins_to_seconds(*diamond_count, self.coin_to_seconds);
                (DeltaKind::Gift, amount.filter(|a| *a > 0)?)
            }
            PlatformEvent::Coins { amount } => {
                let amount = coins_to_seconds(*amount, self.coin_to_seconds);
                (DeltaKind::Coins, amount.filter(|a| *a > 0)?)
            }
            PlatformEvent::Subscribe => (DeltaKind::Sub, self.sub_seconds.max(0)),
            PlatformEvent::GiftedSubs { count } => {
                let seconds = self.gifted_sub_seconds?;
                let count = count.filter(|c| *c > 0).unwrap_or(1);
                let count = i64::try_from(count).unwrap_or(i64::MAX);
                (DeltaKind::GiftedSubs, count.saturating_mul(seconds).max(0))
            }
            PlatformEvent::Other { .. } => return None,
        };

        Some(TimeDelta::new(platform.as_str(), kind, amount))
    }
}

fn coins_to_seconds(quantity: f64, rate: f64) -> Option<i64> {
    let seconds = (quantity * rate).round();
    seconds.is_finite().then_some(seconds as i64)
}
