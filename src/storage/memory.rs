//! In-memory LedgerStore implementation.
//!
//! Default backend and the test substrate. A single `RwLock` over all
//! four collections makes `commit` trivially atomic and isolated: the
//! write guard is held while every precondition is checked and every
//! write applied.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interfaces::ledger_store::{
    LedgerStore, Result, RewardFilter, StorageError, Versioned, WriteOp, REWARDS, SWEEPSTAKES,
    TRANSACTIONS, USERS,
};
use crate::records::{LedgerTransaction, Reward, Sweepstakes, SweepstakesStatus, User};

struct Stored<T> {
    record: T,
    version: u64,
}

impl<T: Clone> Stored<T> {
    fn versioned(&self) -> Versioned<T> {
        Versioned {
            record: self.record.clone(),
            version: self.version,
        }
    }
}

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, Stored<User>>,
    rewards: HashMap<Uuid, Stored<Reward>>,
    sweepstakes: HashMap<Uuid, Stored<Sweepstakes>>,
    transactions: HashMap<Uuid, Stored<LedgerTransaction>>,
}

/// In-memory ledger store.
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Collections>,
    fail_commits: RwLock<bool>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `commit` fail with a backend error.
    /// Test hook for exercising rollback paths.
    pub async fn set_fail_commits(&self, fail: bool) {
        *self.fail_commits.write().await = fail;
    }
}

fn check_version<T>(
    stored: Option<&Stored<T>>,
    collection: &'static str,
    id: Uuid,
    expected: u64,
) -> Result<()> {
    match stored {
        None => Err(StorageError::NotFound { collection, id }),
        Some(s) if s.version != expected => Err(StorageError::VersionConflict {
            collection,
            id,
            expected,
            actual: s.version,
        }),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.id) {
            return Err(StorageError::AlreadyExists {
                collection: USERS,
                key: user.id.to_string(),
            });
        }
        if inner.users.values().any(|s| s.record.email == user.email) {
            return Err(StorageError::AlreadyExists {
                collection: USERS,
                key: user.email.clone(),
            });
        }
        inner.users.insert(user.id, Stored { record: user, version: 1 });
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Versioned<User>> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(&id)
            .map(Stored::versioned)
            .ok_or(StorageError::NotFound {
                collection: USERS,
                id,
            })
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<Versioned<User>>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|s| s.record.email == email)
            .map(Stored::versioned))
    }

    async fn insert_reward(&self, reward: Reward) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.rewards.contains_key(&reward.id) {
            return Err(StorageError::AlreadyExists {
                collection: REWARDS,
                key: reward.id.to_string(),
            });
        }
        inner
            .rewards
            .insert(reward.id, Stored { record: reward, version: 1 });
        Ok(())
    }

    async fn get_reward(&self, id: Uuid) -> Result<Versioned<Reward>> {
        let inner = self.inner.read().await;
        inner
            .rewards
            .get(&id)
            .map(Stored::versioned)
            .ok_or(StorageError::NotFound {
                collection: REWARDS,
                id,
            })
    }

    async fn list_rewards(&self, filter: RewardFilter) -> Result<Vec<Reward>> {
        let inner = self.inner.read().await;
        let mut rewards: Vec<Reward> = inner
            .rewards
            .values()
            .map(|s| &s.record)
            .filter(|r| !filter.active_only || r.is_active)
            .filter(|r| filter.tier.map_or(true, |t| r.eligible_for(t)))
            .filter(|r| filter.category.map_or(true, |c| r.category == c))
            .cloned()
            .collect();
        rewards.sort_by_key(|r| r.points_cost);
        Ok(rewards)
    }

    async fn insert_sweepstakes(&self, sweepstakes: Sweepstakes) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.sweepstakes.contains_key(&sweepstakes.id) {
            return Err(StorageError::AlreadyExists {
                collection: SWEEPSTAKES,
                key: sweepstakes.id.to_string(),
            });
        }
        inner.sweepstakes.insert(
            sweepstakes.id,
            Stored {
                record: sweepstakes,
                version: 1,
            },
        );
        Ok(())
    }

    async fn get_sweepstakes(&self, id: Uuid) -> Result<Versioned<Sweepstakes>> {
        let inner = self.inner.read().await;
        inner
            .sweepstakes
            .get(&id)
            .map(Stored::versioned)
            .ok_or(StorageError::NotFound {
                collection: SWEEPSTAKES,
                id,
            })
    }

    async fn list_sweepstakes(
        &self,
        status: Option<SweepstakesStatus>,
    ) -> Result<Vec<Sweepstakes>> {
        let inner = self.inner.read().await;
        let mut listed: Vec<Sweepstakes> = inner
            .sweepstakes
            .values()
            .map(|s| &s.record)
            .filter(|sw| status.map_or(true, |wanted| sw.status == wanted))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(listed)
    }

    async fn insert_transaction(&self, transaction: LedgerTransaction) -> Result<()> {
        let mut inner = self.inner.write().await;
        insert_transaction_locked(&mut inner, transaction)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Versioned<LedgerTransaction>> {
        let inner = self.inner.read().await;
        inner
            .transactions
            .get(&id)
            .map(Stored::versioned)
            .ok_or(StorageError::NotFound {
                collection: TRANSACTIONS,
                id,
            })
    }

    async fn find_transaction_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Versioned<LedgerTransaction>>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transactions
            .values()
            .find(|s| s.record.payment_id.as_deref() == Some(payment_id))
            .map(Stored::versioned))
    }

    async fn list_transactions_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let inner = self.inner.read().await;
        let mut listed: Vec<LedgerTransaction> = inner
            .transactions
            .values()
            .map(|s| &s.record)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        if *self.fail_commits.read().await {
            return Err(StorageError::Backend("injected commit failure".to_string()));
        }

        let mut inner = self.inner.write().await;

        // Check every precondition before touching anything.
        let mut inserted_ids = std::collections::HashSet::new();
        for op in &ops {
            match op {
                WriteOp::PutUser {
                    user,
                    expected_version,
                } => check_version(inner.users.get(&user.id), USERS, user.id, *expected_version)?,
                WriteOp::PutReward {
                    reward,
                    expected_version,
                } => check_version(
                    inner.rewards.get(&reward.id),
                    REWARDS,
                    reward.id,
                    *expected_version,
                )?,
                WriteOp::PutSweepstakes {
                    sweepstakes,
                    expected_version,
                } => check_version(
                    inner.sweepstakes.get(&sweepstakes.id),
                    SWEEPSTAKES,
                    sweepstakes.id,
                    *expected_version,
                )?,
                WriteOp::PutTransaction {
                    transaction,
                    expected_version,
                } => check_version(
                    inner.transactions.get(&transaction.id),
                    TRANSACTIONS,
                    transaction.id,
                    *expected_version,
                )?,
                WriteOp::InsertTransaction { transaction } => {
                    if inner.transactions.contains_key(&transaction.id)
                        || !inserted_ids.insert(transaction.id)
                    {
                        return Err(StorageError::AlreadyExists {
                            collection: TRANSACTIONS,
                            key: transaction.id.to_string(),
                        });
                    }
                }
            }
        }

        // All checks passed; apply the batch.
        for op in ops {
            match op {
                WriteOp::PutUser { user, .. } => {
                    let stored = inner.users.get_mut(&user.id).expect("checked above");
                    stored.record = user;
                    stored.version += 1;
                }
                WriteOp::PutReward { reward, .. } => {
                    let stored = inner.rewards.get_mut(&reward.id).expect("checked above");
                    stored.record = reward;
                    stored.version += 1;
                }
                WriteOp::PutSweepstakes { sweepstakes, .. } => {
                    let stored = inner
                        .sweepstakes
                        .get_mut(&sweepstakes.id)
                        .expect("checked above");
                    stored.record = sweepstakes;
                    stored.version += 1;
                }
                WriteOp::PutTransaction { transaction, .. } => {
                    let stored = inner
                        .transactions
                        .get_mut(&transaction.id)
                        .expect("checked above");
                    stored.record = transaction;
                    stored.version += 1;
                }
                WriteOp::InsertTransaction { transaction } => {
                    insert_transaction_locked(&mut inner, transaction)?;
                }
            }
        }

        Ok(())
    }
}

fn insert_transaction_locked(
    inner: &mut Collections,
    transaction: LedgerTransaction,
) -> Result<()> {
    if inner.transactions.contains_key(&transaction.id) {
        return Err(StorageError::AlreadyExists {
            collection: TRANSACTIONS,
            key: transaction.id.to_string(),
        });
    }
    inner.transactions.insert(
        transaction.id,
        Stored {
            record: transaction,
            version: 1,
        },
    );
    Ok(())
}
