//! Quota severity tiers

use serde::{Deserialize, Serialize};

/// Quota alert tier, ordered by severity
///
/// Variant order matters: `Info < Warning < Alert` drives the cascade in the
/// evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// More than half of the quota is used
    Info,
    /// Storage is getting tight
    Warning,
    /// Storage is nearly full
    Alert,
}

impl Tier {
    /// All tiers, lowest severity first
    pub const ALL: [Tier; 3] = [Tier::Info, Tier::Warning, Tier::Alert];

    /// Usage percentage that must be exceeded to enter this tier
    pub fn threshold(self) -> f64 {
        match self {
            Self::Info => 50.0,
            Self::Warning => 80.0,
            Self::Alert => 95.0,
        }
    }

    /// Highest tier whose threshold is strictly exceeded by `percentage`
    pub fn for_percentage(percentage: f64) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| percentage > tier.threshold())
    }

    /// This tier and every tier below it
    pub fn and_below(self) -> impl Iterator<Item = Tier> {
        Self::ALL.into_iter().filter(move |t| *t <= self)
    }

    /// Every tier strictly above this one
    pub fn above(self) -> impl Iterator<Item = Tier> {
        Self::ALL.into_iter().filter(move |t| *t > self)
    }

    /// Stable lowercase name, used in storage keys and payloads
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Alert => "alert",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}
