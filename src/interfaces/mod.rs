//! Interfaces the engines depend on.

pub mod ledger_store;
pub mod payment;

pub use ledger_store::{LedgerStore, RewardFilter, StorageError, Versioned, WriteOp};
pub use payment::{PaymentError, PaymentProcessor, PendingCharge, ProcessorKind};
