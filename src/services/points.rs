//! Points engine: earning, admin adjustment, and the loyalty summary.

use std::sync::Arc;

use backon::Retryable;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::required;
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{LedgerStore, Versioned, WriteOp};
use crate::records::{LedgerTransaction, TransactionKind, TransactionStatus, User};
use crate::tier::{benefits_for, multiplier_for, Tier, TierBenefits};
use crate::utils::retry::{conflict_backoff, is_retryable};

/// Result of a point award.
#[derive(Debug, Clone, Serialize)]
pub struct EarnOutcome {
    pub points_earned: u64,
    pub total_points: u64,
    pub tier: Tier,
    pub tier_upgraded: bool,
}

/// Result of an admin adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustOutcome {
    pub user_id: Uuid,
    pub loyalty_points: u64,
    pub tier: Tier,
}

/// Read-only loyalty state for user-facing surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub points: u64,
    pub tier: Tier,
    pub total_spent: f64,
    pub sweepstakes_entries: u64,
    pub benefits: TierBenefits,
}

/// Points for a monetary amount at a tier: floor(amount x multiplier).
pub fn points_for(amount: f64, tier: Tier) -> u64 {
    (amount * multiplier_for(tier)).floor() as u64
}

/// Points engine. Stateless; every mutation is one atomic commit.
#[derive(Clone)]
pub struct PointsService {
    store: Arc<dyn LedgerStore>,
}

impl PointsService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Award points for a settled monetary amount.
    ///
    /// The multiplier is taken from the tier held *before* this award,
    /// so an award that crosses a threshold does not earn at the new
    /// tier's rate. When `related_transaction` is given, that
    /// transaction settles (points recorded, status completed) in the
    /// same commit, and a transaction that already settled awards
    /// nothing; otherwise the caller owns the audit record.
    pub async fn earn_points(
        &self,
        user_id: Uuid,
        amount: f64,
        related_transaction: Option<Uuid>,
    ) -> Result<EarnOutcome> {
        validate_amount(amount)?;

        (|| self.try_earn(user_id, amount, related_transaction))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_earn(
        &self,
        user_id: Uuid,
        amount: f64,
        related_transaction: Option<Uuid>,
    ) -> Result<EarnOutcome> {
        let Versioned {
            record: mut user,
            version,
        } = required(self.store.get_user(user_id).await, "user")?;

        // A related transaction that already settled means this award
        // landed (e.g. a replayed webhook); report it without writing.
        let related = match related_transaction {
            Some(transaction_id) => {
                let found = required(
                    self.store.get_transaction(transaction_id).await,
                    "transaction",
                )?;
                if found.record.status == TransactionStatus::Completed {
                    return Ok(EarnOutcome {
                        points_earned: found.record.points_earned,
                        total_points: user.loyalty_points,
                        tier: user.tier,
                        tier_upgraded: false,
                    });
                }
                Some(found)
            }
            None => None,
        };

        let tier_before = user.tier;
        let points_earned = points_for(amount, tier_before);

        user.loyalty_points += points_earned;
        user.total_spent += amount;
        user.update_tier();
        user.updated_at = Utc::now();

        let tier = user.tier;
        let total_points = user.loyalty_points;

        let mut ops = vec![WriteOp::PutUser {
            user,
            expected_version: version,
        }];

        if let Some(Versioned {
            record: mut transaction,
            version: transaction_version,
        }) = related
        {
            transaction.points_earned = points_earned;
            transaction.status = TransactionStatus::Completed;
            ops.push(WriteOp::PutTransaction {
                transaction,
                expected_version: transaction_version,
            });
        }

        self.store.commit(ops).await?;

        let tier_upgraded = tier_before != tier;
        if tier_upgraded {
            info!(user = %user_id, old_tier = %tier_before, new_tier = %tier, "Tier upgraded");
        }

        Ok(EarnOutcome {
            points_earned,
            total_points,
            tier,
            tier_upgraded,
        })
    }

    /// Add or subtract points directly. Admin-only entry point; the
    /// resulting balance is floored at zero by rejecting over-debits.
    /// Always records one `points_adjustment` audit transaction.
    pub async fn adjust_points(
        &self,
        user_id: Uuid,
        delta: i64,
        reason: &str,
    ) -> Result<AdjustOutcome> {
        (|| self.try_adjust(user_id, delta, reason))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_adjust(&self, user_id: Uuid, delta: i64, reason: &str) -> Result<AdjustOutcome> {
        let Versioned {
            record: mut user,
            version,
        } = required(self.store.get_user(user_id).await, "user")?;

        if delta < 0 {
            let debit = delta.unsigned_abs();
            if user.loyalty_points < debit {
                return Err(LoyaltyError::InsufficientPoints {
                    required: debit,
                    available: user.loyalty_points,
                });
            }
            user.loyalty_points -= debit;
        } else {
            user.loyalty_points += delta as u64;
        }
        user.update_tier();
        user.updated_at = Utc::now();

        let description = if reason.trim().is_empty() {
            "Admin adjustment"
        } else {
            reason
        };
        let transaction = LedgerTransaction::new(user_id, TransactionKind::PointsAdjustment, 0.0)
            .with_points_earned(delta.max(0) as u64)
            .with_points_spent(if delta < 0 { delta.unsigned_abs() } else { 0 })
            .with_status(TransactionStatus::Completed)
            .with_description(description);

        let outcome = AdjustOutcome {
            user_id,
            loyalty_points: user.loyalty_points,
            tier: user.tier,
        };

        self.store
            .commit(vec![
                WriteOp::PutUser {
                    user,
                    expected_version: version,
                },
                WriteOp::InsertTransaction { transaction },
            ])
            .await?;

        info!(user = %user_id, delta, points = outcome.loyalty_points, "Points adjusted");
        Ok(outcome)
    }

    /// Current loyalty state plus tier benefits, for read-only surfaces.
    pub async fn loyalty_summary(&self, user_id: Uuid) -> Result<LoyaltySummary> {
        let user: User = required(self.store.get_user(user_id).await, "user")?.record;
        Ok(LoyaltySummary {
            points: user.loyalty_points,
            tier: user.tier,
            total_spent: user.total_spent,
            sweepstakes_entries: user.sweepstakes_entries,
            benefits: benefits_for(user.tier),
        })
    }

    /// Most recent audit transactions for a user.
    pub async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        Ok(self
            .store
            .list_transactions_for_user(user_id, limit)
            .await?)
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LoyaltyError::Validation(format!(
            "amount must be a non-negative number, got {amount}"
        )));
    }
    Ok(())
}
