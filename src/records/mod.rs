//! Domain records persisted in the ledger store.
//!
//! Four independent collections: users, transactions, rewards, and
//! sweepstakes, each keyed by an opaque identifier generated at creation.
//! Transactions are append-only; only their status (and settlement fields)
//! transition after insert.

mod reward;
mod sweepstakes;
mod transaction;
mod user;

pub use reward::{Reward, RewardCategory};
pub use sweepstakes::{
    Entry, EntryCost, EntryMethod, Prize, Sweepstakes, SweepstakesStatus, Winner,
};
pub use transaction::{LedgerTransaction, PaymentMethod, TransactionKind, TransactionStatus};
pub use user::{Role, User};
