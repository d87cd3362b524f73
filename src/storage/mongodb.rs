//! MongoDB implementation of the ledger store.
//!
//! One document per record, carrying a `version` field. Versioned puts
//! filter on `{_id, version}` so a concurrent writer makes the replace
//! match nothing, and `commit` runs inside a client-session transaction
//! so a batch lands all-or-nothing. Transactions require a replica set
//! or sharded cluster; a standalone server will reject `commit`.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, ClientSession, Collection, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::interfaces::ledger_store::{
    LedgerStore, Result, RewardFilter, StorageError, Versioned, WriteOp, REWARDS, SWEEPSTAKES,
    TRANSACTIONS, USERS,
};
use crate::records::{LedgerTransaction, Reward, Sweepstakes, SweepstakesStatus, User};

/// MongoDB ledger store.
pub struct MongoLedgerStore {
    client: Client,
    users: Collection<Document>,
    rewards: Collection<Document>,
    sweepstakes: Collection<Document>,
    transactions: Collection<Document>,
}

fn backend_err(e: mongodb::error::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Map a write error, turning duplicate-key violations into
/// `AlreadyExists`.
fn insert_err(collection: &'static str, key: String, e: mongodb::error::Error) -> StorageError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref we)) = *e.kind {
        if we.code == 11000 {
            return StorageError::AlreadyExists { collection, key };
        }
    }
    backend_err(e)
}

fn to_doc<T: Serialize>(id: Uuid, record: &T, version: u64) -> Result<Document> {
    let mut doc =
        bson::to_document(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
    doc.insert("_id", id.to_string());
    doc.insert("version", version as i64);
    Ok(doc)
}

fn from_doc<T: DeserializeOwned>(mut doc: Document) -> Result<Versioned<T>> {
    doc.remove("_id");
    let version = match doc.remove("version") {
        Some(Bson::Int64(v)) => v as u64,
        Some(Bson::Int32(v)) => v as u64,
        _ => 0,
    };
    let record =
        bson::from_document(doc).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(Versioned { record, version })
}

fn record_only<T: DeserializeOwned>(doc: Document) -> Result<T> {
    from_doc(doc).map(|v| v.record)
}

impl MongoLedgerStore {
    /// Create a new MongoDB ledger store.
    pub async fn new(client: &Client, database_name: &str) -> Result<Self> {
        let database = client.database(database_name);
        let store = Self {
            client: client.clone(),
            users: database.collection(USERS),
            rewards: database.collection(REWARDS),
            sweepstakes: database.collection(SWEEPSTAKES),
            transactions: database.collection(TRANSACTIONS),
        };
        store.init().await?;
        Ok(store)
    }

    /// Initialize indexes for query performance and email uniqueness.
    async fn init(&self) -> Result<()> {
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users
            .create_index(email_index)
            .await
            .map_err(backend_err)?;

        let user_tx_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "created_at": -1 })
            .build();
        self.transactions
            .create_index(user_tx_index)
            .await
            .map_err(backend_err)?;

        let status_index = IndexModel::builder().keys(doc! { "status": 1 }).build();
        self.transactions
            .create_index(status_index.clone())
            .await
            .map_err(backend_err)?;
        self.sweepstakes
            .create_index(status_index)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    /// Replace a record iff its stored version matches. Distinguishes
    /// missing records from concurrent writes by re-reading on a miss.
    async fn put_versioned<T: Serialize>(
        &self,
        session: &mut ClientSession,
        collection: &Collection<Document>,
        name: &'static str,
        id: Uuid,
        record: &T,
        expected_version: u64,
    ) -> Result<()> {
        let filter = doc! { "_id": id.to_string(), "version": expected_version as i64 };
        let replacement = to_doc(id, record, expected_version + 1)?;

        let result = collection
            .replace_one(filter, replacement)
            .session(&mut *session)
            .await
            .map_err(backend_err)?;

        if result.matched_count == 0 {
            let current = collection
                .find_one(doc! { "_id": id.to_string() })
                .session(&mut *session)
                .await
                .map_err(backend_err)?;
            return Err(match current {
                None => StorageError::NotFound {
                    collection: name,
                    id,
                },
                Some(doc) => StorageError::VersionConflict {
                    collection: name,
                    id,
                    expected: expected_version,
                    actual: doc.get_i64("version").unwrap_or(0) as u64,
                },
            });
        }

        Ok(())
    }

    async fn apply_ops(&self, session: &mut ClientSession, ops: &[WriteOp]) -> Result<()> {
        for op in ops {
            match op {
                WriteOp::PutUser {
                    user,
                    expected_version,
                } => {
                    self.put_versioned(session, &self.users, USERS, user.id, user, *expected_version)
                        .await?
                }
                WriteOp::PutReward {
                    reward,
                    expected_version,
                } => {
                    self.put_versioned(
                        session,
                        &self.rewards,
                        REWARDS,
                        reward.id,
                        reward,
                        *expected_version,
                    )
                    .await?
                }
                WriteOp::PutSweepstakes {
                    sweepstakes,
                    expected_version,
                } => {
                    self.put_versioned(
                        session,
                        &self.sweepstakes,
                        SWEEPSTAKES,
                        sweepstakes.id,
                        sweepstakes,
                        *expected_version,
                    )
                    .await?
                }
                WriteOp::PutTransaction {
                    transaction,
                    expected_version,
                } => {
                    self.put_versioned(
                        session,
                        &self.transactions,
                        TRANSACTIONS,
                        transaction.id,
                        transaction,
                        *expected_version,
                    )
                    .await?
                }
                WriteOp::InsertTransaction { transaction } => {
                    let doc = to_doc(transaction.id, transaction, 1)?;
                    self.transactions
                        .insert_one(doc)
                        .session(&mut *session)
                        .await
                        .map_err(|e| {
                            insert_err(TRANSACTIONS, transaction.id.to_string(), e)
                        })?;
                }
            }
        }
        Ok(())
    }

    async fn get_by_id<T: DeserializeOwned>(
        &self,
        collection: &Collection<Document>,
        name: &'static str,
        id: Uuid,
    ) -> Result<Versioned<T>> {
        let doc = collection
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(backend_err)?
            .ok_or(StorageError::NotFound {
                collection: name,
                id,
            })?;
        from_doc(doc)
    }
}

#[async_trait]
impl LedgerStore for MongoLedgerStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let doc = to_doc(user.id, &user, 1)?;
        self.users
            .insert_one(doc)
            .await
            .map_err(|e| insert_err(USERS, user.email.clone(), e))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Versioned<User>> {
        self.get_by_id(&self.users, USERS, id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<Versioned<User>>> {
        let doc = self
            .users
            .find_one(doc! { "email": email })
            .await
            .map_err(backend_err)?;
        doc.map(from_doc).transpose()
    }

    async fn insert_reward(&self, reward: Reward) -> Result<()> {
        let doc = to_doc(reward.id, &reward, 1)?;
        self.rewards
            .insert_one(doc)
            .await
            .map_err(|e| insert_err(REWARDS, reward.id.to_string(), e))?;
        Ok(())
    }

    async fn get_reward(&self, id: Uuid) -> Result<Versioned<Reward>> {
        self.get_by_id(&self.rewards, REWARDS, id).await
    }

    async fn list_rewards(&self, filter: RewardFilter) -> Result<Vec<Reward>> {
        let mut query = Document::new();
        if filter.active_only {
            query.insert("is_active", true);
        }
        if let Some(tier) = filter.tier {
            query.insert(
                "$or",
                vec![
                    doc! { "tier": Bson::Null },
                    doc! { "tier": tier.to_string() },
                ],
            );
        }
        if let Some(category) = filter.category {
            let value = bson::to_bson(&category)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            query.insert("category", value);
        }

        let docs: Vec<Document> = self
            .rewards
            .find(query)
            .sort(doc! { "points_cost": 1 })
            .await
            .map_err(backend_err)?
            .try_collect()
            .await
            .map_err(backend_err)?;

        docs.into_iter().map(record_only).collect()
    }

    async fn insert_sweepstakes(&self, sweepstakes: Sweepstakes) -> Result<()> {
        let doc = to_doc(sweepstakes.id, &sweepstakes, 1)?;
        self.sweepstakes
            .insert_one(doc)
            .await
            .map_err(|e| insert_err(SWEEPSTAKES, sweepstakes.id.to_string(), e))?;
        Ok(())
    }

    async fn get_sweepstakes(&self, id: Uuid) -> Result<Versioned<Sweepstakes>> {
        self.get_by_id(&self.sweepstakes, SWEEPSTAKES, id).await
    }

    async fn list_sweepstakes(
        &self,
        status: Option<SweepstakesStatus>,
    ) -> Result<Vec<Sweepstakes>> {
        let query = match status {
            Some(status) => doc! { "status": status.to_string() },
            None => Document::new(),
        };

        let docs: Vec<Document> = self
            .sweepstakes
            .find(query)
            .sort(doc! { "start_date": -1 })
            .await
            .map_err(backend_err)?
            .try_collect()
            .await
            .map_err(backend_err)?;

        docs.into_iter().map(record_only).collect()
    }

    async fn insert_transaction(&self, transaction: LedgerTransaction) -> Result<()> {
        let doc = to_doc(transaction.id, &transaction, 1)?;
        self.transactions
            .insert_one(doc)
            .await
            .map_err(|e| insert_err(TRANSACTIONS, transaction.id.to_string(), e))?;
        Ok(())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Versioned<LedgerTransaction>> {
        self.get_by_id(&self.transactions, TRANSACTIONS, id).await
    }

    async fn find_transaction_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<Versioned<LedgerTransaction>>> {
        let doc = self
            .transactions
            .find_one(doc! { "payment_id": payment_id })
            .await
            .map_err(backend_err)?;
        doc.map(from_doc).transpose()
    }

    async fn list_transactions_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<LedgerTransaction>> {
        let docs: Vec<Document> = self
            .transactions
            .find(doc! { "user_id": user_id.to_string() })
            .sort(doc! { "created_at": -1 })
            .limit(limit as i64)
            .await
            .map_err(backend_err)?
            .try_collect()
            .await
            .map_err(backend_err)?;

        docs.into_iter().map(record_only).collect()
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<()> {
        let mut session = self.client.start_session().await.map_err(backend_err)?;
        session.start_transaction().await.map_err(backend_err)?;

        match self.apply_ops(&mut session, &ops).await {
            Ok(()) => session.commit_transaction().await.map_err(backend_err),
            Err(e) => {
                // Best effort; the server aborts abandoned transactions.
                let _ = session.abort_transaction().await;
                Err(e)
            }
        }
    }
}
