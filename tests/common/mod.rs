//! Shared test fixtures.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use karat::interfaces::payment::{
    PaymentError, PaymentProcessor, PendingCharge, ProcessorKind,
};
use karat::records::{
    EntryCost, EntryMethod, Prize, Reward, RewardCategory, Sweepstakes, SweepstakesStatus, User,
};
use karat::storage::MemoryLedgerStore;

pub fn store() -> Arc<MemoryLedgerStore> {
    Arc::new(MemoryLedgerStore::new())
}

/// A customer with the given balance and a matching derived tier.
pub fn user_with_points(points: u64) -> User {
    let mut user = User::new(
        &format!("user-{}@example.com", Uuid::new_v4()),
        "Test",
        "User",
    );
    user.loyalty_points = points;
    user.update_tier();
    user
}

pub fn reward(points_cost: u64, stock: Option<u32>) -> Reward {
    let mut reward = Reward::new(
        "Free coffee",
        "One free coffee",
        points_cost,
        RewardCategory::Freebie,
    );
    reward.stock_quantity = stock;
    reward
}

/// An active points-entry sweepstakes with one single-quantity prize.
pub fn active_sweepstakes(points_per_entry: u64) -> Sweepstakes {
    let now = Utc::now();
    let mut sweepstakes = Sweepstakes::new(
        "Summer trip",
        "Win a trip",
        now - Duration::days(1),
        now + Duration::days(7),
    );
    assert_eq!(sweepstakes.status, SweepstakesStatus::Active);
    sweepstakes.entry_method = EntryMethod::Points;
    sweepstakes.entry_cost = EntryCost {
        points: points_per_entry,
        amount: 0.0,
    };
    sweepstakes.prizes = vec![Prize {
        name: "Trip".to_string(),
        value: 2500.0,
        quantity: 1,
    }];
    sweepstakes
}

/// Scripted payment processor.
pub struct MockProcessor {
    pub kind: ProcessorKind,
    pub settled: bool,
    pub decline: bool,
}

impl MockProcessor {
    pub fn card(settled: bool) -> Arc<dyn PaymentProcessor> {
        Arc::new(Self {
            kind: ProcessorKind::Card,
            settled,
            decline: false,
        })
    }

    pub fn declining_card() -> Arc<dyn PaymentProcessor> {
        Arc::new(Self {
            kind: ProcessorKind::Card,
            settled: false,
            decline: true,
        })
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    fn kind(&self) -> ProcessorKind {
        self.kind
    }

    async fn charge(&self, _amount: f64, _metadata: Value) -> Result<PendingCharge, PaymentError> {
        if self.decline {
            return Err(PaymentError::Declined("card declined".to_string()));
        }
        Ok(PendingCharge {
            payment_id: format!("pay_{}", Uuid::new_v4().simple()),
            settled: self.settled,
        })
    }
}
