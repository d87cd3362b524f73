//! Domain error taxonomy.
//!
//! Every failure a loyalty operation can report to its caller. Domain
//! failures carry enough detail for the caller to render a specific
//! message; storage failures surface as a generic `Store` variant.

use uuid::Uuid;

use crate::interfaces::ledger_store::StorageError;
use crate::interfaces::payment::PaymentError;
use crate::tier::Tier;

/// Result type for loyalty operations.
pub type Result<T> = std::result::Result<T, LoyaltyError>;

/// Errors reported by the points, reward, and sweepstakes engines.
#[derive(Debug, thiserror::Error)]
pub enum LoyaltyError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: Uuid },

    #[error("Insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: u64, available: u64 },

    #[error("Tier requirement not met: need {required}, have {actual}")]
    TierMismatch { required: Tier, actual: Tier },

    #[error("Sweepstakes not active")]
    NotActive,

    #[error("Reward not available")]
    Unavailable,

    #[error("Winners already announced")]
    AlreadyAnnounced,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Store(#[from] StorageError),
}

impl LoyaltyError {
    /// Whether the operation may succeed if replayed against fresh state.
    ///
    /// Only version conflicts qualify; domain rejections are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoyaltyError::Store(StorageError::VersionConflict { .. })
        )
    }
}
