//! Karat - loyalty ledger and sweepstakes engine.
//!
//! Users earn points from purchases, redeem them for rewards, and enter
//! weighted-random sweepstakes draws. Every point-balance mutation is a
//! version-checked read-modify-write against a document ledger and appends
//! one immutable audit transaction, so two concurrent spends of the same
//! balance cannot both succeed.

pub mod config;
pub mod error;
pub mod interfaces;
pub mod records;
pub mod services;
pub mod storage;
pub mod tier;
pub mod utils;

pub use error::{LoyaltyError, Result};
