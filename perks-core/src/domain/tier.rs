//! Tier table and classifier
//!
//! Tiers form a static ordered ladder keyed by point thresholds. The
//! classifier is a pure function over the table; all tier state elsewhere
//! in the crate is derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A loyalty tier, ordered by rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    /// Ordinal rank, bronze = 0
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Lowercase wire name, matching the channel schema
    pub fn name(self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }

    /// Parse a wire name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Tier> {
        match name.trim().to_lowercase().as_str() {
            "bronze" => Some(Tier::Bronze),
            "silver" => Some(Tier::Silver),
            "gold" => Some(Tier::Gold),
            "platinum" => Some(Tier::Platinum),
            "diamond" => Some(Tier::Diamond),
            _ => None,
        }
    }

    /// Minimum balance required to hold this tier
    pub fn min_points(self) -> i64 {
        TIER_TABLE[self.rank()].min_points
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the tier table
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub tier: Tier,
    pub min_points: i64,
    pub benefits: &'static [&'static str],
}

/// The tier ladder, strictly increasing in `min_points`.
/// Index i corresponds to `Tier` with rank i.
pub const TIER_TABLE: [TierSpec; 5] = [
    TierSpec {
        tier: Tier::Bronze,
        min_points: 0,
        benefits: &["Earn points on every order"],
    },
    TierSpec {
        tier: Tier::Silver,
        min_points: 1000,
        benefits: &["Earn points on every order", "Free standard shipping"],
    },
    TierSpec {
        tier: Tier::Gold,
        min_points: 5000,
        benefits: &[
            "Earn points on every order",
            "Free standard shipping",
            "Early access to drops",
        ],
    },
    TierSpec {
        tier: Tier::Platinum,
        min_points: 15000,
        benefits: &[
            "Earn points on every order",
            "Free express shipping",
            "Early access to drops",
            "Birthday bonus points",
        ],
    },
    TierSpec {
        tier: Tier::Diamond,
        min_points: 50000,
        benefits: &[
            "Earn points on every order",
            "Free express shipping",
            "Early access to drops",
            "Birthday bonus points",
            "Dedicated concierge",
        ],
    },
];

/// Classification result for a balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatus {
    pub tier: Tier,
    /// Progress toward the next tier, 0-100. Fixed at 100 for the top tier.
    pub progress_percent: f64,
    /// Points still needed to reach the next tier, 0 for the top tier
    pub points_to_next: i64,
}

/// Classify a balance into its tier and progress toward the next one.
///
/// The tier is the highest table entry whose threshold the balance meets.
/// Monotonic non-decreasing in `balance`.
pub fn classify(balance: i64) -> TierStatus {
    let balance = balance.max(0);
    // First index whose threshold exceeds the balance; the current tier
    // sits one below it. Bronze's zero threshold keeps idx >= 1.
    let idx = TIER_TABLE.partition_point(|spec| spec.min_points <= balance);
    let current = &TIER_TABLE[idx - 1];

    match TIER_TABLE.get(idx) {
        Some(next) => {
            let span = (next.min_points - current.min_points) as f64;
            let progress = ((balance - current.min_points) as f64 / span * 100.0).min(100.0);
            TierStatus {
                tier: current.tier,
                progress_percent: progress,
                points_to_next: next.min_points - balance,
            }
        }
        None => TierStatus {
            tier: current.tier,
            progress_percent: 100.0,
            points_to_next: 0,
        },
    }
}
