//! Conversion rules for turning platform events into timer seconds.
//!
//! The rule document is JSON and is loaded once at startup:
//!
//! ```json
//! {
//!   "baseSeconds": 3600,
//!   "maxSeconds": 7200,
//!   "decaySecondsPerSecond": 1,
//!   "manualStep": 60,
//!   "tiktok": { "coinToSeconds": 0.5, "subSeconds": 120 },
//!   "kick": { "subscriptionSeconds": 120, "giftedSubSeconds": 120, "kickCoinToSeconds": 0.5 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};

/// TikTok conversion table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TikTokRules {
    /// Seconds added per gift diamond.
    pub coin_to_seconds: f64,
    /// Seconds added per subscription.
    pub sub_seconds: i64,
}

/// Kick conversion table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickRules {
    /// Seconds added per subscription.
    pub subscription_seconds: i64,
    /// Seconds added per gifted subscription.
    pub gifted_sub_seconds: i64,
    /// Seconds added per coin spent on paid messages and stickers.
    pub kick_coin_to_seconds: f64,
}

/// Immutable timer rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Starting value of the countdown.
    pub base_seconds: i64,
    /// Upper bound of the countdown.
    pub max_seconds: i64,
    /// Seconds removed per elapsed wall-clock second.
    pub decay_seconds_per_second: f64,
    /// Default amount for manual adjustments without an explicit value.
    pub manual_step: i64,
    pub tiktok: TikTokRules,
    pub kick: KickRules,
    /// The document exactly as parsed, when loaded from JSON.
    #[serde(skip)]
    document: Option<Arc<Value>>,
}

impl RuleSet {
    /// Load and validate a rule document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read rules file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a rule document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("Invalid rules document: {}", e)))?;
        let mut rules: RuleSet = serde_json::from_value(document.clone())
            .map_err(|e| Error::config(format!("Invalid rules document: {}", e)))?;
        rules.validate()?;
        rules.document = Some(Arc::new(document));
        Ok(rules)
    }

    /// The rules as a JSON document.
    ///
    /// Rules parsed from JSON echo the source document, including any keys
    /// the hub does not use.
    pub fn document(&self) -> Arc<Value> {
        match &self.document {
            Some(document) => document.clone(),
            None => Arc::new(serde_json::to_value(self).unwrap_or_default()),
        }
    }

    /// Check the bounds every component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.base_seconds < 0 || self.base_seconds > self.max_seconds {
            return Err(Error::config(format!(
                "baseSeconds must be within [0, maxSeconds], got {} (max {})",
                self.base_seconds, self.max_seconds
            )));
        }
        if !self.decay_seconds_per_second.is_finite() || self.decay_seconds_per_second < 0.0 {
            return Err(Error::config(
                "decaySecondsPerSecond must be a finite number >= 0",
            ));
        }
        if self.manual_step < 0 {
            return Err(Error::config("manualStep must be >= 0"));
        }

        let rates = [
            ("tiktok.coinToSeconds", self.tiktok.coin_to_seconds),
            ("kick.kickCoinToSeconds", self.kick.kick_coin_to_seconds),
        ];
        for (name, rate) in rates {
            if !rate.is_finite() || rate < 0.0 {
                return Err(Error::config(format!("{name} must be a finite number >= 0")));
            }
        }

        let constants = [
            ("tiktok.subSeconds", self.tiktok.sub_seconds),
            ("kick.subscriptionSeconds", self.kick.subscription_seconds),
            ("kick.giftedSubSeconds", self.kick.gifted_sub_seconds),
        ];
        for (name, value) in constants {
            if value < 0 {
                return Err(Error::config(format!("{name} must be >= 0")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_rules() -> RuleSet {
    RuleSet {
        base_seconds: 3600,
        max_seconds: 7200,
        decay_seconds_per_second: 1.0,
        manual_step: 60,
        tiktok: TikTokRules {
            coin_to_seconds: 0.5,
            sub_seconds: 120,
        },
        kick: KickRules {
            subscription_seconds: 120,
            gifted_sub_seconds: 90,
            kick_coin_to_seconds: 0.25,
        },
        document: None,
    }
}
