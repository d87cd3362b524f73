//! Reward redemption and catalog management.

use std::sync::Arc;

use backon::Retryable;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::required;
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{LedgerStore, RewardFilter, Versioned, WriteOp};
use crate::records::{
    LedgerTransaction, Reward, RewardCategory, TransactionKind, TransactionStatus,
};
use crate::tier::Tier;
use crate::utils::retry::{conflict_backoff, is_retryable};

/// Result of a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionOutcome {
    pub reward: Reward,
    pub remaining_points: u64,
    pub transaction: LedgerTransaction,
}

/// Catalog listing as seen by one user.
#[derive(Debug, Clone, Serialize)]
pub struct RewardCatalog {
    pub rewards: Vec<Reward>,
    pub user_points: u64,
    pub user_tier: Tier,
}

/// Admin payload for creating a reward.
#[derive(Debug, Clone)]
pub struct NewReward {
    pub name: String,
    pub description: String,
    pub points_cost: u64,
    pub tier: Option<Tier>,
    pub category: RewardCategory,
    pub value: Option<f64>,
    pub stock_quantity: Option<u32>,
    pub usage_limit: Option<u32>,
    pub expiration_days: Option<u32>,
    pub image_url: Option<String>,
}

/// Admin payload for editing a reward. Absent fields are left alone;
/// `tier: Some(None)` clears the tier requirement.
#[derive(Debug, Clone, Default)]
pub struct RewardPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub points_cost: Option<u64>,
    pub tier: Option<Option<Tier>>,
    pub category: Option<RewardCategory>,
    pub value: Option<f64>,
    pub is_active: Option<bool>,
    pub stock_quantity: Option<u32>,
    pub usage_limit: Option<u32>,
    pub expiration_days: Option<u32>,
    pub image_url: Option<String>,
}

/// Reward redemption engine.
#[derive(Clone)]
pub struct RewardService {
    store: Arc<dyn LedgerStore>,
}

impl RewardService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Redeem a reward: debit points, record the audit transaction, and
    /// decrement stock, all in one atomic commit. A redemption that
    /// cannot be afforded fails without touching the user record.
    pub async fn redeem(&self, user_id: Uuid, reward_id: Uuid) -> Result<RedemptionOutcome> {
        (|| self.try_redeem(user_id, reward_id))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_redeem(&self, user_id: Uuid, reward_id: Uuid) -> Result<RedemptionOutcome> {
        let Versioned {
            record: mut user,
            version: user_version,
        } = required(self.store.get_user(user_id).await, "user")?;
        let Versioned {
            record: mut reward,
            version: reward_version,
        } = required(self.store.get_reward(reward_id).await, "reward")?;

        if !reward.available() {
            return Err(LoyaltyError::Unavailable);
        }
        if user.loyalty_points < reward.points_cost {
            return Err(LoyaltyError::InsufficientPoints {
                required: reward.points_cost,
                available: user.loyalty_points,
            });
        }
        if let Some(required_tier) = reward.tier {
            if required_tier != user.tier {
                return Err(LoyaltyError::TierMismatch {
                    required: required_tier,
                    actual: user.tier,
                });
            }
        }

        let now = Utc::now();
        user.loyalty_points -= reward.points_cost;
        user.update_tier();
        user.updated_at = now;
        let remaining_points = user.loyalty_points;

        let transaction = LedgerTransaction::new(
            user_id,
            TransactionKind::RewardRedemption,
            reward.value.unwrap_or(0.0),
        )
        .with_points_spent(reward.points_cost)
        .with_status(TransactionStatus::Completed)
        .with_description(format!("Redeemed: {}", reward.name))
        .with_metadata(json!({ "reward_id": reward.id }));

        let mut ops = vec![
            WriteOp::PutUser {
                user,
                expected_version: user_version,
            },
            WriteOp::InsertTransaction {
                transaction: transaction.clone(),
            },
        ];

        if let Some(stock) = reward.stock_quantity {
            let stock = stock.saturating_sub(1);
            reward.stock_quantity = Some(stock);
            if stock == 0 {
                reward.is_active = false;
            }
            reward.updated_at = now;
            ops.push(WriteOp::PutReward {
                reward: reward.clone(),
                expected_version: reward_version,
            });
        }

        self.store.commit(ops).await?;

        info!(
            user = %user_id,
            reward = %reward.name,
            points_spent = reward.points_cost,
            "Reward redeemed"
        );

        Ok(RedemptionOutcome {
            reward,
            remaining_points,
            transaction,
        })
    }

    /// Active rewards the user's tier can redeem, cheapest first.
    pub async fn available_rewards(
        &self,
        user_id: Uuid,
        category: Option<RewardCategory>,
    ) -> Result<RewardCatalog> {
        let user = required(self.store.get_user(user_id).await, "user")?.record;
        let rewards = self
            .store
            .list_rewards(RewardFilter {
                active_only: true,
                tier: Some(user.tier),
                category,
            })
            .await?;

        Ok(RewardCatalog {
            rewards,
            user_points: user.loyalty_points,
            user_tier: user.tier,
        })
    }

    /// Admin: add a catalog item.
    pub async fn create_reward(&self, new: NewReward) -> Result<Reward> {
        if new.name.trim().is_empty() {
            return Err(LoyaltyError::Validation("reward name is required".into()));
        }

        let mut reward = Reward::new(&new.name, &new.description, new.points_cost, new.category);
        reward.tier = new.tier;
        reward.value = new.value;
        reward.stock_quantity = new.stock_quantity;
        if let Some(usage_limit) = new.usage_limit {
            reward.usage_limit = usage_limit;
        }
        if let Some(expiration_days) = new.expiration_days {
            reward.expiration_days = expiration_days;
        }
        reward.image_url = new.image_url;

        self.store.insert_reward(reward.clone()).await?;
        Ok(reward)
    }

    /// Admin: edit a catalog item.
    pub async fn update_reward(&self, reward_id: Uuid, patch: RewardPatch) -> Result<Reward> {
        (|| self.try_update(reward_id, &patch))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_update(&self, reward_id: Uuid, patch: &RewardPatch) -> Result<Reward> {
        let Versioned {
            record: mut reward,
            version,
        } = required(self.store.get_reward(reward_id).await, "reward")?;

        if let Some(name) = &patch.name {
            reward.name = name.clone();
        }
        if let Some(description) = &patch.description {
            reward.description = description.clone();
        }
        if let Some(points_cost) = patch.points_cost {
            reward.points_cost = points_cost;
        }
        if let Some(tier) = patch.tier {
            reward.tier = tier;
        }
        if let Some(category) = patch.category {
            reward.category = category;
        }
        if let Some(value) = patch.value {
            reward.value = Some(value);
        }
        if let Some(is_active) = patch.is_active {
            reward.is_active = is_active;
        }
        if let Some(stock_quantity) = patch.stock_quantity {
            reward.stock_quantity = Some(stock_quantity);
        }
        if let Some(usage_limit) = patch.usage_limit {
            reward.usage_limit = usage_limit;
        }
        if let Some(expiration_days) = patch.expiration_days {
            reward.expiration_days = expiration_days;
        }
        if let Some(image_url) = &patch.image_url {
            reward.image_url = Some(image_url.clone());
        }
        reward.updated_at = Utc::now();

        self.store
            .commit(vec![WriteOp::PutReward {
                reward: reward.clone(),
                expected_version: version,
            }])
            .await?;

        Ok(reward)
    }
}
