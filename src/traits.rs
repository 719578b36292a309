//! Traits for the snapshot source, the remote service and progress reporting

use async_trait::async_trait;

use crate::types::*;

/// Source of account snapshots and their unreconciled transactions
///
/// This trait allows the reconciler to work against any mirror of the
/// budgeting service (a local SQLite export, an in-memory fixture, etc.).
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Resolve each pattern to exactly one open account, in pattern order
    ///
    /// Fails with [`ReconcileError::AmbiguousMatch`] if any pattern matches zero
    /// or several accounts.
    async fn find_accounts(&self, patterns: &[String]) -> ReconcileResult<Vec<AccountSnapshot>>;

    /// Get the non-reconciled transactions of each account, ordered by date
    ///
    /// The outer vector is parallel to `accounts`.
    async fn unreconciled_transactions(
        &self,
        accounts: &[AccountSnapshot],
    ) -> ReconcileResult<Vec<Vec<Transaction>>>;
}

/// Remote mutation endpoint that marks transactions as reconciled
#[async_trait]
pub trait ReconcileService: Send + Sync {
    /// Set every listed transaction of `budget_id` to `reconciled`
    ///
    /// Returns [`ReconcileError::RateLimited`] when the service refuses the
    /// request because it covers too many transactions at once.
    async fn mark_reconciled(&self, budget_id: &str, transaction_ids: &[String])
        -> ReconcileResult<()>;
}

#[async_trait]
impl<T: ReconcileService + ?Sized> ReconcileService for std::sync::Arc<T> {
    async fn mark_reconciled(
        &self,
        budget_id: &str,
        transaction_ids: &[String],
    ) -> ReconcileResult<()> {
        (**self).mark_reconciled(budget_id, transaction_ids).await
    }
}

/// Sink for progress of long-running steps
///
/// Implementations must tolerate concurrent `advance` calls.
pub trait Progress: Send + Sync {
    /// Announce a new phase and its total number of steps
    fn start(&self, label: &str, total: u64);

    /// Record `steps` more completed steps
    fn advance(&self, steps: u64);

    /// Mark the current phase finished, possibly before reaching the total
    fn finish(&self);
}

/// Progress sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _label: &str, _total: u64) {}

    fn advance(&self, _steps: u64) {}

    fn finish(&self) {}
}
