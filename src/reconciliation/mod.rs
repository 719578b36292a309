//! Reconciliation engine
//!
//! [`matcher`] finds the minimal set of transactions that closes the gap to a
//! target balance, [`applier`] commits that set to the remote service, and
//! [`orchestrator`] runs both for a list of account targets.

pub mod applier;
pub mod matcher;
pub mod orchestrator;

pub use applier::*;
pub use matcher::*;
pub use orchestrator::*;
