//! Ledger storage interface.
//!
//! Four record collections (users, transactions, rewards, sweepstakes)
//! with per-record optimistic versioning. Single-record mutations and
//! multi-record sequences alike go through [`LedgerStore::commit`], which
//! applies a batch of version-checked writes as one isolated unit: either
//! every write lands or none do. Engines run a read-modify-commit loop
//! and retry on [`StorageError::VersionConflict`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::records::{
    LedgerTransaction, Reward, Sweepstakes, SweepstakesStatus, User,
};
use crate::tier::Tier;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Collection names, shared by backends and error reporting.
pub const USERS: &str = "users";
pub const TRANSACTIONS: &str = "transactions";
pub const REWARDS: &str = "rewards";
pub const SWEEPSTAKES: &str = "sweepstakes";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("Record already exists: {collection}/{key}")]
    AlreadyExists {
        collection: &'static str,
        key: String,
    },

    #[error("Version conflict: {collection}/{id} expected {expected}, got {actual}")]
    VersionConflict {
        collection: &'static str,
        id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A record together with the version observed when it was read.
///
/// Pass the version back in a `Put` op to assert the record has not
/// changed underneath the caller.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// One write in a commit batch. `Put` variants carry the version the
/// caller read; `InsertTransaction` appends a fresh audit record.
#[derive(Debug, Clone)]
pub enum WriteOp {
    PutUser {
        user: User,
        expected_version: u64,
    },
    PutReward {
        reward: Reward,
        expected_version: u64,
    },
    PutSweepstakes {
        sweepstakes: Sweepstakes,
        expected_version: u64,
    },
    PutTransaction {
        transaction: LedgerTransaction,
        expected_version: u64,
    },
    InsertTransaction {
        transaction: LedgerTransaction,
    },
}

/// Catalog query filter for rewards.
#[derive(Debug, Clone, Default)]
pub struct RewardFilter {
    pub active_only: bool,
    /// Restrict to rewards redeemable at this tier (tier-specific
    /// rewards for other tiers are filtered out; tierless rewards pass).
    pub tier: Option<Tier>,
    pub category: Option<crate::records::RewardCategory>,
}

/// Interface for ledger persistence.
///
/// Implementations:
/// - `MemoryLedgerStore`: in-memory storage (default, tests)
/// - `MongoLedgerStore`: MongoDB storage (`mongodb` feature)
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- users ---

    /// Insert a new user. Fails with `AlreadyExists` on id or email
    /// collision (emails are unique).
    async fn insert_user(&self, user: User) -> Result<()>;

    async fn get_user(&self, id: Uuid) -> Result<Versioned<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<Versioned<User>>>;

    // --- rewards ---

    async fn insert_reward(&self, reward: Reward) -> Result<()>;

    async fn get_reward(&self, id: Uuid) -> Result<Versioned<Reward>>;

    /// Rewards matching the filter, sorted by points cost ascending.
    async fn list_rewards(&self, filter: RewardFilter) -> Result<Vec<Reward>>;

    // --- sweepstakes ---

    async fn insert_sweepstakes(&self, sweepstakes: Sweepstakes) -> Result<()>;

    async fn get_sweepstakes(&self, id: Uuid) -> Result<Versioned<Sweepstakes>>;

    /// Sweepstakes with the given status (or all), sorted by start date
    /// descending.
    async fn list_sweepstakes(
        &self,
        status: Option<SweepstakesStatus>,
    ) -> Result<Vec<Sweepstakes>>;

    // --- transactions ---

    async fn insert_transaction(&self, transaction: LedgerTransaction) -> Result<()>;

    async fn get_transaction(&self, id: Uuid) -> Result<Versioned<LedgerTransaction>>;

    async fn find_transaction_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Versioned<LedgerTransaction>>>;

    /// Most recent transactions for a user, newest first.
    async fn list_transactions_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>>;

    // --- atomic commit ---

    /// Apply a batch of writes as one isolated unit.
    ///
    /// Every precondition (record existence, expected version, insert
    /// uniqueness) is checked before any write is applied; on failure
    /// nothing is applied and the first violation is returned. Partial
    /// completion is never observable.
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()>;
}
