//! Payment reconciliation.
//!
//! Purchases are charged through a processor capability and recorded as
//! pending transactions; webhook confirmation settles them through the
//! points engine (or marks them failed without touching points).

use std::sync::Arc;

use backon::Retryable;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::points::PointsService;
use super::required;
use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{LedgerStore, Versioned, WriteOp};
use crate::interfaces::payment::{
    PaymentError, PendingCharge, ProcessorKind, ProcessorRegistry,
};
use crate::records::{
    LedgerTransaction, PaymentMethod, TransactionKind, TransactionStatus,
};
use crate::tier::Tier;
use crate::utils::retry::{conflict_backoff, is_retryable};

/// Result of initiating a purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub transaction: LedgerTransaction,
    pub charge: PendingCharge,
}

/// Result of settling a purchase.
#[derive(Debug, Clone, Serialize)]
pub struct SettledPurchase {
    pub transaction: LedgerTransaction,
    pub points_earned: u64,
    pub total_points: u64,
    pub tier: Tier,
}

/// Payment reconciliation service.
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    points: PointsService,
    processors: Arc<ProcessorRegistry>,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        points: PointsService,
        processors: ProcessorRegistry,
    ) -> Self {
        Self {
            store,
            points,
            processors: Arc::new(processors),
        }
    }

    /// Charge a purchase through the processor handling `method` and
    /// record it as a pending transaction. Processors that settle
    /// synchronously are completed (and points awarded) immediately.
    pub async fn begin_purchase(
        &self,
        user_id: Uuid,
        amount: f64,
        method: PaymentMethod,
        description: &str,
    ) -> Result<PurchaseOutcome> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LoyaltyError::Validation(
                "purchase amount must be positive".into(),
            ));
        }
        required(self.store.get_user(user_id).await, "user")?;

        let kind = ProcessorKind::for_method(method);
        let processor = self
            .processors
            .get(&kind)
            .ok_or(PaymentError::UnsupportedMethod(method))?;

        let charge = processor
            .charge(
                amount,
                json!({ "user_id": user_id, "description": description }),
            )
            .await?;

        let transaction = LedgerTransaction::new(user_id, TransactionKind::Purchase, amount)
            .with_payment(method, Some(charge.payment_id.clone()))
            .with_description(description);
        self.store.insert_transaction(transaction.clone()).await?;

        info!(
            user = %user_id,
            amount,
            method = ?method,
            payment_id = %charge.payment_id,
            "Purchase initiated"
        );

        if charge.settled {
            let settled = self.complete(transaction.id).await?;
            return Ok(PurchaseOutcome {
                transaction: settled.transaction,
                charge,
            });
        }

        Ok(PurchaseOutcome {
            transaction,
            charge,
        })
    }

    /// Settle a pending purchase: mark it completed and award points
    /// for the settled amount, atomically. Completing an already
    /// completed transaction is a no-op.
    pub async fn complete(&self, transaction_id: Uuid) -> Result<SettledPurchase> {
        let transaction = required(
            self.store.get_transaction(transaction_id).await,
            "transaction",
        )?
        .record;

        match transaction.status {
            TransactionStatus::Completed => {
                let user = required(self.store.get_user(transaction.user_id).await, "user")?.record;
                Ok(SettledPurchase {
                    points_earned: transaction.points_earned,
                    total_points: user.loyalty_points,
                    tier: user.tier,
                    transaction,
                })
            }
            TransactionStatus::Pending => {
                let earn = self
                    .points
                    .earn_points(transaction.user_id, transaction.amount, Some(transaction_id))
                    .await?;
                let transaction = required(
                    self.store.get_transaction(transaction_id).await,
                    "transaction",
                )?
                .record;
                Ok(SettledPurchase {
                    transaction,
                    points_earned: earn.points_earned,
                    total_points: earn.total_points,
                    tier: earn.tier,
                })
            }
            other => Err(LoyaltyError::Validation(format!(
                "cannot complete a {other:?} transaction"
            ))),
        }
    }

    /// Mark a pending purchase failed without touching points. Failing
    /// an already failed transaction is a no-op.
    pub async fn fail(&self, transaction_id: Uuid) -> Result<LedgerTransaction> {
        (|| self.try_fail(transaction_id))
            .retry(conflict_backoff())
            .when(is_retryable)
            .await
    }

    async fn try_fail(&self, transaction_id: Uuid) -> Result<LedgerTransaction> {
        let Versioned {
            record: mut transaction,
            version,
        } = required(
            self.store.get_transaction(transaction_id).await,
            "transaction",
        )?;

        match transaction.status {
            TransactionStatus::Failed => Ok(transaction),
            TransactionStatus::Pending => {
                transaction.status = TransactionStatus::Failed;
                self.store
                    .commit(vec![WriteOp::PutTransaction {
                        transaction: transaction.clone(),
                        expected_version: version,
                    }])
                    .await?;
                info!(transaction = %transaction_id, "Purchase marked failed");
                Ok(transaction)
            }
            other => Err(LoyaltyError::Validation(format!(
                "cannot fail a {other:?} transaction"
            ))),
        }
    }

    /// Webhook success path: settle the transaction carrying this
    /// gateway payment id. Unknown payment ids are ignored.
    pub async fn complete_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<SettledPurchase>> {
        match self.store.find_transaction_by_payment_id(payment_id).await? {
            Some(found) => self.complete(found.record.id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Webhook failure path: mark the transaction carrying this gateway
    /// payment id failed. Unknown payment ids are ignored.
    pub async fn fail_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<LedgerTransaction>> {
        match self.store.find_transaction_by_payment_id(payment_id).await? {
            Some(found) => self.fail(found.record.id).await.map(Some),
            None => Ok(None),
        }
    }
}
