//! Ledger transaction record: the append-only audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    RewardRedemption,
    PointsAdjustment,
    SweepstakesEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// How a purchase was paid. The core never talks to a vendor directly;
/// the method only routes to a processor capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Square,
    Chime,
    Cashapp,
    Venmo,
    Zelle,
    Crypto,
    Card,
}

/// One immutable audit record. Every point-balance mutation on a user
/// produces exactly one of these; after insert, only `status` and the
/// settlement `points_earned` may change (pending -> completed/failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub points_earned: u64,
    pub points_spent: u64,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn new(user_id: Uuid, kind: TransactionKind, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            amount,
            points_earned: 0,
            points_spent: 0,
            payment_method: PaymentMethod::Card,
            payment_id: None,
            status: TransactionStatus::Pending,
            description: String::new(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_points_spent(mut self, points: u64) -> Self {
        self.points_spent = points;
        self
    }

    pub fn with_points_earned(mut self, points: u64) -> Self {
        self.points_earned = points;
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_payment(mut self, method: PaymentMethod, payment_id: Option<String>) -> Self {
        self.payment_method = method;
        self.payment_id = payment_id;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
