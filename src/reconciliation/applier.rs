//! Commit a reconciliation to the remote service
//!
//! The applier first sends every transaction in one batched request. If the
//! service answers with the batch-too-large rejection it falls back to one
//! request per transaction, all in flight at once, and waits for every one of
//! them before reporting.

use futures::future::join_all;

use crate::traits::{NoProgress, Progress, ReconcileService};
use crate::types::*;

/// Where an [`Applier`] is in the commit protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyState {
    /// Nothing sent yet
    Init,
    /// The batched request is in flight
    BatchAttempted,
    /// The batched request succeeded
    Succeeded,
    /// The batched request failed with an error that is not recoverable
    Failed,
    /// The service refused the batch as too large
    Rejected,
    /// Per-transaction requests are in flight
    FallbackDispatched { requests: usize },
    /// Every per-transaction request has completed
    FallbackJoined(FallbackOutcome),
}

/// Result of the per-transaction fallback once all requests are back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    Success,
    PartialFailure { succeeded: usize, failed: usize },
}

/// Drives one reconciliation commit through [`ApplyState`]
pub struct Applier<'a, S: ReconcileService + ?Sized> {
    service: &'a S,
    progress: &'a dyn Progress,
    state: ApplyState,
}

impl<'a, S: ReconcileService + ?Sized> Applier<'a, S> {
    /// Create an applier that reports no progress
    pub fn new(service: &'a S) -> Self {
        Self::with_progress(service, &NoProgress)
    }

    /// Create an applier reporting completed transactions to `progress`
    pub fn with_progress(service: &'a S, progress: &'a dyn Progress) -> Self {
        Self {
            service,
            progress,
            state: ApplyState::Init,
        }
    }

    /// Current protocol state
    pub fn state(&self) -> &ApplyState {
        &self.state
    }

    fn transition(&mut self, next: ApplyState) {
        tracing::debug!(from = ?self.state, to = ?next, "Apply state transition");
        self.state = next;
    }

    /// Mark `transactions` as reconciled in budget `budget_id`
    ///
    /// Only [`ReconcileError::RateLimited`] on the batched request is recovered
    /// here; any other error is returned unchanged. Failures in the fallback
    /// are collected into [`ReconcileError::PartialFailure`] so the caller can
    /// see which transactions did make it.
    pub async fn apply(
        &mut self,
        transactions: &[Transaction],
        budget_id: &str,
    ) -> ReconcileResult<()> {
        let ids: Vec<String> = transactions.iter().map(|t| t.id.clone()).collect();

        self.progress.start("Reconciling", ids.len() as u64);
        let result = self.run(&ids, budget_id).await;
        self.progress.finish();
        result
    }

    async fn run(&mut self, ids: &[String], budget_id: &str) -> ReconcileResult<()> {
        if ids.is_empty() {
            self.transition(ApplyState::Succeeded);
            return Ok(());
        }

        self.transition(ApplyState::BatchAttempted);
        match self.service.mark_reconciled(budget_id, ids).await {
            Ok(()) => {
                self.progress.advance(ids.len() as u64);
                self.transition(ApplyState::Succeeded);
                Ok(())
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(
                    count = ids.len(),
                    "Batch rejected as too large, reconciling one transaction at a time"
                );
                self.transition(ApplyState::Rejected);
                self.fan_out(ids, budget_id).await
            }
            Err(e) => {
                self.transition(ApplyState::Failed);
                Err(e)
            }
        }
    }

    async fn fan_out(&mut self, ids: &[String], budget_id: &str) -> ReconcileResult<()> {
        self.transition(ApplyState::FallbackDispatched {
            requests: ids.len(),
        });

        let service = self.service;
        let progress = self.progress;
        let results = join_all(ids.iter().map(|id| async move {
            let result = service
                .mark_reconciled(budget_id, std::slice::from_ref(id))
                .await;
            if result.is_ok() {
                progress.advance(1);
            }
            (id, result)
        }))
        .await;

        let mut reconciled = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => reconciled.push(id.clone()),
                Err(e) => {
                    if e.is_rate_limited() {
                        tracing::error!(transaction_id = %id, "Single-transaction request rejected as too large");
                    } else {
                        tracing::error!(transaction_id = %id, error = %e, "Failed to reconcile transaction");
                    }
                    failed.push((id.clone(), e.to_string()));
                }
            }
        }

        if failed.is_empty() {
            self.transition(ApplyState::FallbackJoined(FallbackOutcome::Success));
            Ok(())
        } else {
            self.transition(ApplyState::FallbackJoined(FallbackOutcome::PartialFailure {
                succeeded: reconciled.len(),
                failed: failed.len(),
            }));
            Err(ReconcileError::PartialFailure { reconciled, failed })
        }
    }
}

/// Mark `transactions` as reconciled, falling back to one request per
/// transaction if the service rejects the batch as too large
pub async fn apply<S: ReconcileService + ?Sized>(
    service: &S,
    transactions: &[Transaction],
    budget_id: &str,
    progress: &dyn Progress,
) -> ReconcileResult<()> {
    Applier::with_progress(service, progress)
        .apply(transactions, budget_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::CountingProgress;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every request and answers according to `respond`
    struct ScriptedService {
        calls: Mutex<Vec<Vec<String>>>,
        respond: Box<dyn Fn(&[String]) -> ReconcileResult<()> + Send + Sync>,
    }

    impl ScriptedService {
        fn new(respond: impl Fn(&[String]) -> ReconcileResult<()> + Send + Sync + 'static) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReconcileService for ScriptedService {
        async fn mark_reconciled(
            &self,
            _budget_id: &str,
            transaction_ids: &[String],
        ) -> ReconcileResult<()> {
            self.calls.lock().unwrap().push(transaction_ids.to_vec());
            (self.respond)(transaction_ids)
        }
    }

    fn batch_too_large(ids: &[String]) -> ReconcileResult<()> {
        if ids.len() > 1 {
            Err(ReconcileError::RateLimited)
        } else {
            Ok(())
        }
    }

    fn transactions(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| {
                Transaction::new(
                    format!("t{}", i),
                    "budget",
                    "account",
                    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    BigDecimal::from(i as i64),
                    "Payee",
                    ClearedStatus::Uncleared,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn batch_success_sends_one_request() {
        let service = ScriptedService::new(|_| Ok(()));
        let progress = CountingProgress::new();
        let mut applier = Applier::with_progress(&service, &progress);

        applier.apply(&transactions(3), "budget").await.unwrap();

        assert_eq!(service.calls().len(), 1);
        assert_eq!(service.calls()[0], vec!["t0", "t1", "t2"]);
        assert_eq!(applier.state(), &ApplyState::Succeeded);
        assert_eq!(progress.completed(), 3);
        assert!(progress.finished());
    }

    #[tokio::test]
    async fn rejection_fans_out_one_request_per_transaction() {
        let service = ScriptedService::new(batch_too_large);
        let progress = CountingProgress::new();
        let mut applier = Applier::with_progress(&service, &progress);

        applier.apply(&transactions(4), "budget").await.unwrap();

        let calls = service.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].len(), 4);
        let singles: HashSet<String> = calls[1..]
            .iter()
            .map(|call| {
                assert_eq!(call.len(), 1);
                call[0].clone()
            })
            .collect();
        assert_eq!(singles.len(), 4);
        assert_eq!(
            applier.state(),
            &ApplyState::FallbackJoined(FallbackOutcome::Success)
        );
        assert_eq!(progress.completed(), 4);
    }

    #[tokio::test]
    async fn other_errors_propagate_without_fallback() {
        let service = ScriptedService::new(|_| {
            Err(ReconcileError::Remote {
                status: 429,
                id: "429".into(),
                detail: "Too many requests".into(),
            })
        });
        let mut applier = Applier::new(&service);

        let err = applier.apply(&transactions(3), "budget").await.unwrap_err();

        assert!(matches!(err, ReconcileError::Remote { status: 429, .. }));
        assert_eq!(service.calls().len(), 1);
        assert_eq!(applier.state(), &ApplyState::Failed);
    }

    #[tokio::test]
    async fn partial_fallback_failure_is_reported_per_transaction() {
        let service = ScriptedService::new(|ids| match ids {
            [single] if single == "t1" => Err(ReconcileError::Remote {
                status: 500,
                id: "500".into(),
                detail: "boom".into(),
            }),
            [_] => Ok(()),
            _ => Err(ReconcileError::RateLimited),
        });
        let progress = CountingProgress::new();
        let mut applier = Applier::with_progress(&service, &progress);

        let err = applier.apply(&transactions(3), "budget").await.unwrap_err();

        match err {
            ReconcileError::PartialFailure { reconciled, failed } => {
                assert_eq!(reconciled, vec!["t0", "t2"]);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, "t1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            applier.state(),
            &ApplyState::FallbackJoined(FallbackOutcome::PartialFailure {
                succeeded: 2,
                failed: 1
            })
        );
        assert_eq!(progress.completed(), 2);
    }

    #[tokio::test]
    async fn rejection_during_fallback_is_an_error() {
        let service = ScriptedService::new(|_| Err(ReconcileError::RateLimited));
        let mut applier = Applier::new(&service);

        let err = applier.apply(&transactions(2), "budget").await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::PartialFailure { ref reconciled, ref failed }
                if reconciled.is_empty() && failed.len() == 2
        ));
        assert_eq!(service.calls().len(), 3);
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() {
        let service = ScriptedService::new(|_| Ok(()));
        let mut applier = Applier::new(&service);

        applier.apply(&[], "budget").await.unwrap();

        assert!(service.calls().is_empty());
        assert_eq!(applier.state(), &ApplyState::Succeeded);
    }

    #[tokio::test]
    async fn free_function_applies_batch() {
        let service = ScriptedService::new(|_| Ok(()));
        apply(&service, &transactions(2), "budget", &NoProgress)
            .await
            .unwrap();
        assert_eq!(service.calls().len(), 1);
    }
}
