//! Tier policy.
//!
//! Pure mapping from a lifetime point balance to a loyalty tier and its
//! earn multiplier. Consulted after every balance change; never cached
//! across mutations.

use serde::{Deserialize, Serialize};

/// Loyalty tier, derived solely from the point balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        };
        f.write_str(name)
    }
}

/// Benefits attached to a tier, for user-facing summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBenefits {
    pub multiplier: f64,
    pub description: &'static str,
}

/// Tier for a given point balance.
///
/// Thresholds are fixed: <1000 bronze, <2500 silver, <5000 gold,
/// <10000 platinum, else diamond.
pub fn tier_for(points: u64) -> Tier {
    if points >= 10_000 {
        Tier::Diamond
    } else if points >= 5_000 {
        Tier::Platinum
    } else if points >= 2_500 {
        Tier::Gold
    } else if points >= 1_000 {
        Tier::Silver
    } else {
        Tier::Bronze
    }
}

/// Earn multiplier for a tier.
pub fn multiplier_for(tier: Tier) -> f64 {
    match tier {
        Tier::Bronze => 1.0,
        Tier::Silver => 1.1,
        Tier::Gold => 1.25,
        Tier::Platinum => 1.5,
        Tier::Diamond => 2.0,
    }
}

/// Benefits description for a tier.
pub fn benefits_for(tier: Tier) -> TierBenefits {
    let description = match tier {
        Tier::Bronze => "Base tier - 1x points",
        Tier::Silver => "Silver tier - 1.1x points",
        Tier::Gold => "Gold tier - 1.25x points",
        Tier::Platinum => "Platinum tier - 1.5x points",
        Tier::Diamond => "Diamond tier - 2x points",
    };
    TierBenefits {
        multiplier: multiplier_for(tier),
        description,
    }
}
