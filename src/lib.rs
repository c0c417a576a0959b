//! Loan lifecycle ledger.
//!
//! Loans move through `APPLIED -> APPROVED | REJECTED` and `APPROVED -> PAID`.
//! [`lifecycle`] holds the pure transitions, [`executor::LoanExecutor`] applies
//! them against any [`store::VersionedStore`] with optimistic concurrency, so
//! concurrent callers on one key either commit in sequence or see a conflict.

pub mod config;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod loan;
pub mod sled_store;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{ExecutorConfig, LedgerConfig};
pub use error::{ErrorKind, LifecycleError, LoanError, Operation, StoreError};
pub use executor::{Attempt, Command, LoanExecutor};
pub use loan::{Decision, LoanRecord, LoanStatus};
pub use sled_store::SledStore;
pub use store::{MemoryStore, Version, Versioned, VersionedStore, WriteOutcome};
