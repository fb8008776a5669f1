//! Typed events emitted by platform sources.
//!
//! Sources only surface the events that can affect the timer. Anything else a
//! platform sends is reported as [`PlatformEvent::Other`] so callers can log it
//! without treating it as an error.

use serde::{Deserialize, Serialize};

/// A single monetization event from a platform feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// A gift worth `diamond_count` platform coins.
    Gift { diamond_count: f64 },
    /// A single subscription.
    Subscribe,
    /// Subscriptions gifted to other viewers. `None` when the platform sent no
    /// usable count.
    GiftedSubs { count: Option<u64> },
    /// Paid message or sticker worth `amount` platform coins.
    Coins { amount: f64 },
    /// Any other event the protocol recognized but does not convert.
    Other { kind: String },
}

impl PlatformEvent {
    /// Short event name used in logs.
    pub fn name(&self) -> &str {
        match self {
            Self::Gift { .. } => "gift",
            Self::Subscribe => "sub",
            Self::GiftedSubs { .. } => "gifted_subs",
            Self::Coins { .. } => "coins",
            Self::Other { kind } => kind,
        }
    }
}
