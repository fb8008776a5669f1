use std::fmt;

/// What produced a timer delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Gift,
    Sub,
    GiftedSubs,
    Coins,
    ManualAdd,
    ManualSub,
    Decay,
}

impl DeltaKind {
    /// Name used in `event` notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gift => "gift",
            Self::Sub => "sub",
            Self::GiftedSubs => "gifted_subs",
            Self::Coins => "coins",
            Self::ManualAdd => "manual_add",
            Self::ManualSub => "manual_sub",
            Self::Decay => "decay",
        }
    }

    /// Whether the delta came from a streaming platform.
    pub fn is_platform_event(&self) -> bool {
        matches!(self, Self::Gift | Self::Sub | Self::GiftedSubs | Self::Coins)
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed change to the countdown, consumed once by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDelta {
    /// Origin of the delta ("tiktok", "kick", "manual", "decay")
    pub source_tag: String,
    pub kind: DeltaKind,
    pub amount_seconds: i64,
}

impl TimeDelta {
    pub fn new(source_tag: impl Into<String>, kind: DeltaKind, amount_seconds: i64) -> Self {
        Self {
            source_tag: source_tag.into(),
            kind,
            amount_seconds,
        }
    }
}
