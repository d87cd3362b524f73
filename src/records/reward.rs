//! Reward catalog item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tier::Tier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardCategory {
    Discount,
    Freebie,
    Cashback,
    ExclusiveAccess,
    SweepstakesBonus,
}

/// A redeemable catalog item. Redemption is the only consumer-facing
/// mutation; everything else is admin CRUD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub points_cost: u64,
    /// Tier required to redeem; `None` means any tier qualifies.
    pub tier: Option<Tier>,
    pub category: RewardCategory,
    pub value: Option<f64>,
    pub is_active: bool,
    pub expiration_days: u32,
    /// When tracked, decremented on redemption; the reward deactivates
    /// at zero.
    pub stock_quantity: Option<u32>,
    pub usage_limit: u32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn new(name: &str, description: &str, points_cost: u64, category: RewardCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            points_cost,
            tier: None,
            category,
            value: None,
            is_active: true,
            expiration_days: 30,
            stock_quantity: None,
            usage_limit: 1,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a user at `tier` may redeem this reward.
    pub fn eligible_for(&self, tier: Tier) -> bool {
        self.tier.map_or(true, |required| required == tier)
    }

    /// Whether the reward can currently be redeemed at all.
    pub fn available(&self) -> bool {
        self.is_active && self.stock_quantity != Some(0)
    }
}
