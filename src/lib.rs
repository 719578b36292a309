//! # YNAB Reconcile
//!
//! Reconciles a budget account against a known statement balance by finding
//! which unreconciled transactions have to be marked reconciled for the
//! cleared balance to equal the target, then commits them through the
//! budgeting service's API.
//!
//! ## Features
//!
//! - **Minimal matching**: exhaustive search that returns the smallest set of
//!   uncleared transactions reaching the target, ties broken by input order
//! - **Exact money**: amounts are `BigDecimal`, never floating point
//! - **Batch commit with fallback**: one bulk request, then one request per
//!   transaction if the service rejects the batch as too large
//! - **Snapshot abstraction**: read accounts from a local SQLite export or any
//!   other [`SnapshotProvider`]
//!
//! ## Quick Start
//!
//! ```rust
//! use ynab_reconcile::{find_to_reconcile, ClearedStatus, Transaction};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! let pending = vec![Transaction::new(
//!     "t1",
//!     "budget",
//!     "checking",
//!     NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
//!     BigDecimal::from(-25),
//!     "Grocer",
//!     ClearedStatus::Uncleared,
//! )];
//!
//! let result = find_to_reconcile(&pending, &BigDecimal::from(500), &BigDecimal::from(475));
//! assert!(result.found);
//! assert_eq!(result.transactions.len(), 1);
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod reconciliation;
pub mod snapshot;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use client::YnabClient;
pub use config::Config;
pub use reconciliation::*;
pub use snapshot::{MemorySnapshotProvider, SqliteSnapshotProvider};
pub use traits::*;
pub use types::*;
