//! Clearline Ledger Core
//!
//! Multi-party transactional ledger: accounts with type-aware sign
//! invariants and an immutable, queryable transaction audit trail.
//!
//! # Architecture
//!
//! - **Single Writer**: one actor task owns the tables; every operation is
//!   exactly one atomic unit of work
//! - **Typed Failures**: business errors are ordinary values, never panics
//! - **Durable or Ephemeral**: RocksDB-backed with upgrade-on-read schema
//!   evolution, or purely in-memory
//!
//! # Invariants
//!
//! - Conservation: concurrent transfers never create or destroy money
//! - Atomicity: a failed transfer leaves every account untouched
//! - Sign: balances stay non-negative except receivables/payables
//! - Append-only: transactions are never modified or deleted

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod participants;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::Ledger;
pub use metrics::Metrics;
pub use participants::{participant_account_id, ParticipantDirectory, StaticDirectory};
pub use storage::Storage;
pub use types::{Account, AccountType, Entry, Transaction};
