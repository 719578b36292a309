//! Run the matcher (and optionally the applier) for a list of account targets

use bigdecimal::BigDecimal;
use serde::Serialize;

use crate::reconciliation::applier::Applier;
use crate::reconciliation::matcher::find_to_reconcile_with_progress;
use crate::traits::*;
use crate::types::*;
use crate::utils::validate_targets;

/// What happened to one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// The cleared balance already equals the target
    AlreadyReconciled,
    /// These transactions reach the target; `committed` if they were applied
    Matched {
        transactions: Vec<Transaction>,
        committed: bool,
    },
    /// No combination of uncleared transactions reaches the target
    NoMatch,
    /// A match was found but committing it failed
    Failed {
        transactions: Vec<Transaction>,
        error: String,
    },
}

impl Outcome {
    /// Process exit code for this outcome; higher is worse
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::AlreadyReconciled | Outcome::Matched { .. } => 0,
            Outcome::NoMatch => 1,
            Outcome::Failed { .. } => 2,
        }
    }
}

/// Result for one (account, target) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    pub account: AccountSnapshot,
    /// Target as the user supplied it
    pub target: BigDecimal,
    pub outcome: Outcome,
}

/// Result of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub accounts: Vec<AccountReport>,
}

impl RunReport {
    /// Worst exit code across accounts
    pub fn exit_code(&self) -> i32 {
        self.accounts
            .iter()
            .map(|report| report.outcome.exit_code())
            .max()
            .unwrap_or(0)
    }

    /// User-facing summary of the run, one line per entry
    ///
    /// Commit errors are not included; they belong on stderr.
    pub fn render(&self) -> String {
        let batch = self.accounts.len() > 1;
        let mut lines = Vec::new();

        for report in &self.accounts {
            if batch {
                lines.push(format!("** {} **", report.account.label()));
            }

            match &report.outcome {
                Outcome::AlreadyReconciled => {
                    lines.push("Balance already reconciled to target".to_string())
                }
                Outcome::NoMatch => lines.push("No match found".to_string()),
                Outcome::Matched {
                    transactions,
                    committed,
                } => {
                    render_match(&mut lines, &report.account, transactions);
                    if *committed {
                        lines.push(format!("Reconciled {} transaction(s)", transactions.len()));
                    }
                    lines.push("Done".to_string());
                }
                Outcome::Failed { transactions, .. } => {
                    render_match(&mut lines, &report.account, transactions);
                }
            }
        }

        if batch {
            lines.push("Batch reconciling done.".to_string());
        }

        lines.join("\n")
    }
}

/// "Match found:" followed by the transactions, smallest displayed amount first
fn render_match(lines: &mut Vec<String>, account: &AccountSnapshot, transactions: &[Transaction]) {
    lines.push("Match found:".to_string());

    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| account.display_amount(&t.amount));
    lines.extend(sorted.into_iter().map(|t| format!("* {}", account.describe(t))));
}

/// Coordinates snapshot loading, matching and committing
pub struct Reconciler<P: SnapshotProvider, S: ReconcileService> {
    provider: P,
    service: Option<S>,
    progress: Box<dyn Progress>,
}

impl<P: SnapshotProvider, S: ReconcileService> Reconciler<P, S> {
    /// Create a reconciler that can only look for matches
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            service: None,
            progress: Box::new(NoProgress),
        }
    }

    /// Attach the remote service used when committing
    pub fn with_service(mut self, service: S) -> Self {
        self.service = Some(service);
        self
    }

    /// Report search and commit progress to `progress`
    pub fn with_progress(mut self, progress: Box<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Reconcile every target, committing matches if `commit` is set
    ///
    /// Input problems and ambiguous account patterns fail the whole run before
    /// any search starts. A commit failure only marks that account as
    /// [`Outcome::Failed`]; the remaining accounts are still processed.
    pub async fn run(&self, targets: &[AccountTarget], commit: bool) -> ReconcileResult<RunReport> {
        validate_targets(targets)?;
        if commit && self.service.is_none() {
            return Err(ReconcileError::Config(
                "Committing requires a remote service".to_string(),
            ));
        }

        let patterns: Vec<String> = targets.iter().map(|t| t.pattern.clone()).collect();
        let accounts = self.provider.find_accounts(&patterns).await?;
        let transactions = self.provider.unreconciled_transactions(&accounts).await?;

        let mut report = RunReport::default();
        for ((target, account), transactions) in targets.iter().zip(accounts).zip(transactions) {
            let outcome = self
                .reconcile_account(&account, &transactions, &target.target, commit)
                .await;
            report.accounts.push(AccountReport {
                account,
                target: target.target.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(account = %account.label()))]
    async fn reconcile_account(
        &self,
        account: &AccountSnapshot,
        transactions: &[Transaction],
        target: &BigDecimal,
        commit: bool,
    ) -> Outcome {
        let internal_target = account.internal_target(target);
        let result = find_to_reconcile_with_progress(
            transactions,
            &account.cleared_balance,
            &internal_target,
            self.progress.as_ref(),
        );

        if result.transactions.is_empty() {
            return if result.found {
                tracing::info!("Balance already reconciled to target");
                Outcome::AlreadyReconciled
            } else {
                tracing::info!(
                    tested = result.combinations_tested,
                    "No match found"
                );
                Outcome::NoMatch
            };
        }

        tracing::info!(count = result.transactions.len(), "Match found");

        let service = match (&self.service, commit) {
            (Some(service), true) => service,
            _ => {
                return Outcome::Matched {
                    transactions: result.transactions,
                    committed: false,
                }
            }
        };

        let mut applier = Applier::with_progress(service, self.progress.as_ref());
        match applier.apply(&result.transactions, &account.budget_id).await {
            Ok(()) => Outcome::Matched {
                transactions: result.transactions,
                committed: true,
            },
            Err(e) => {
                tracing::error!(error = %e, state = ?applier.state(), "Reconciliation failed");
                Outcome::Failed {
                    transactions: result.transactions,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_report_takes_worst_exit_code() {
        let account = AccountSnapshot {
            budget_id: "b".into(),
            budget_name: "Budget".into(),
            account_id: "a".into(),
            account_name: "Checking".into(),
            kind: AccountKind::Checking,
            cleared_balance: BigDecimal::from(0),
            currency: "$".into(),
        };
        let report_for = |outcome| AccountReport {
            account: account.clone(),
            target: BigDecimal::from(0),
            outcome,
        };

        assert_eq!(RunReport::default().exit_code(), 0);

        let report = RunReport {
            accounts: vec![
                report_for(Outcome::AlreadyReconciled),
                report_for(Outcome::NoMatch),
                report_for(Outcome::Matched {
                    transactions: vec![],
                    committed: false,
                }),
            ],
        };
        assert_eq!(report.exit_code(), 1);

        let failed = RunReport {
            accounts: vec![
                report_for(Outcome::NoMatch),
                report_for(Outcome::Failed {
                    transactions: vec![],
                    error: "boom".into(),
                }),
            ],
        };
        assert_eq!(failed.exit_code(), 2);
    }

    fn checking() -> AccountSnapshot {
        AccountSnapshot {
            budget_id: "b".into(),
            budget_name: "Home".into(),
            account_id: "chk".into(),
            account_name: "Checking".into(),
            kind: AccountKind::Checking,
            cleared_balance: BigDecimal::from(-500),
            currency: "$".into(),
        }
    }

    fn txn(id: &str, internal_amount: i64, payee: &str) -> Transaction {
        Transaction::new(
            id,
            "b",
            "chk",
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            BigDecimal::from(internal_amount),
            payee,
            ClearedStatus::Uncleared,
        )
    }

    fn single(outcome: Outcome) -> RunReport {
        RunReport {
            accounts: vec![AccountReport {
                account: checking(),
                target: BigDecimal::from(0),
                outcome,
            }],
        }
    }

    #[test]
    fn render_simple_outcomes() {
        assert_eq!(
            single(Outcome::AlreadyReconciled).render(),
            "Balance already reconciled to target"
        );
        assert_eq!(single(Outcome::NoMatch).render(), "No match found");
        assert_eq!(RunReport::default().render(), "");
    }

    #[test]
    fn render_match_sorted_by_displayed_amount() {
        // Internal +25 is a 25.00 outflow, internal -100 a 100.00 inflow
        let report = single(Outcome::Matched {
            transactions: vec![txn("a", -100, "Salary"), txn("b", 25, "Grocer")],
            committed: true,
        });

        assert_eq!(
            report.render(),
            [
                "Match found:",
                "*    -$25.00 - Grocer",
                "*    $100.00 - Salary",
                "Reconciled 2 transaction(s)",
                "Done",
            ]
            .join("\n")
        );
    }

    #[test]
    fn render_failed_commit_lists_sorted_match() {
        let report = single(Outcome::Failed {
            transactions: vec![txn("a", -100, "Salary"), txn("b", 25, "Grocer")],
            error: "boom".into(),
        });

        assert_eq!(
            report.render(),
            "Match found:\n*    -$25.00 - Grocer\n*    $100.00 - Salary"
        );
    }

    #[test]
    fn render_batch_adds_headers_and_trailer() {
        let mut savings = checking();
        savings.account_name = "Savings".into();

        let report = RunReport {
            accounts: vec![
                AccountReport {
                    account: checking(),
                    target: BigDecimal::from(0),
                    outcome: Outcome::NoMatch,
                },
                AccountReport {
                    account: savings,
                    target: BigDecimal::from(0),
                    outcome: Outcome::AlreadyReconciled,
                },
            ],
        };

        assert_eq!(
            report.render(),
            [
                "** Home - Checking **",
                "No match found",
                "** Home - Savings **",
                "Balance already reconciled to target",
                "Batch reconciling done.",
            ]
            .join("\n")
        );
    }
}
