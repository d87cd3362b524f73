//! Loyalty engines.
//!
//! Stateless services over the ledger store: each operation is a
//! version-checked read-modify-commit, retried on conflict, that appends
//! one audit transaction per balance mutation.

pub mod maintenance;
pub mod payments;
pub mod points;
pub mod rewards;
pub mod sweepstakes;

pub use maintenance::{MaintenanceScheduler, MaintenanceService, SweepReport};
pub use payments::{PaymentService, PurchaseOutcome, SettledPurchase};
pub use points::{AdjustOutcome, EarnOutcome, LoyaltySummary, PointsService};
pub use rewards::{NewReward, RedemptionOutcome, RewardCatalog, RewardPatch, RewardService};
pub use sweepstakes::{
    draw_winners, EntryOutcome, NewSweepstakes, SweepstakesPatch, SweepstakesService,
    SweepstakesView,
};

use crate::error::{LoyaltyError, Result};
use crate::interfaces::ledger_store::{StorageError, Versioned};

/// Lift a storage read into the domain: an absent record becomes a
/// domain `NotFound` rather than a generic store failure.
pub(crate) fn required<T>(
    result: std::result::Result<Versioned<T>, StorageError>,
    what: &'static str,
) -> Result<Versioned<T>> {
    result.map_err(|e| match e {
        StorageError::NotFound { id, .. } => LoyaltyError::NotFound { what, id },
        other => LoyaltyError::Store(other),
    })
}
