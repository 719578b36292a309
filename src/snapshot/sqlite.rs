//! Snapshot provider backed by a local SQLite export of the budget
//!
//! The export is kept up to date by a separate sync tool; this provider only
//! reads from it. Amounts are stored as integer milliunits with the service's
//! sign, and are negated into the ledger's internal convention on the way in.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::snapshot::resolve_patterns;
use crate::traits::*;
use crate::types::*;

const OPEN_ACCOUNTS_QUERY: &str = r#"
    SELECT
        budgets.id AS budget_id
        , budgets.name AS budget_name
        , accounts.id AS account_id
        , accounts.name AS account_name
        , accounts.type AS account_type
        , accounts.cleared_balance AS cleared_balance
        , budgets.currency_format_currency_symbol AS currency
    FROM accounts
    JOIN budgets
        ON accounts.budget_id = budgets.id
    WHERE
        NOT accounts.deleted
        AND NOT accounts.closed
    ORDER BY budget_name, account_name
"#;

const UNRECONCILED_QUERY: &str = r#"
    SELECT
        id
        , budget_id
        , account_id
        , date
        , amount
        , payee_name
        , cleared
    FROM transactions
    WHERE
        account_id = ?
        AND cleared != 'reconciled'
        AND NOT deleted
    ORDER BY date
"#;

/// Reads accounts and transactions from the SQLite mirror
#[derive(Debug, Clone)]
pub struct SqliteSnapshotProvider {
    pool: SqlitePool,
}

impl SqliteSnapshotProvider {
    /// Open the mirror at `path` read-only
    pub async fn connect(path: &Path) -> ReconcileResult<Self> {
        if !path.exists() {
            return Err(ReconcileError::Storage(format!(
                "No budget database found at {}; run the sync first",
                path.display()
            )));
        }

        let options = SqliteConnectOptions::new().filename(path).read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "Opened budget database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn account_from_row(row: &SqliteRow) -> ReconcileResult<AccountSnapshot> {
        let kind: String = row.try_get("account_type")?;
        let cleared_balance: i64 = row.try_get("cleared_balance")?;
        let currency: Option<String> = row.try_get("currency")?;

        Ok(AccountSnapshot {
            budget_id: row.try_get("budget_id")?,
            budget_name: row.try_get("budget_name")?,
            account_id: row.try_get("account_id")?,
            account_name: row.try_get("account_name")?,
            kind: AccountKind::from(kind),
            cleared_balance: -from_milliunits(cleared_balance),
            currency: currency.unwrap_or_default(),
        })
    }

    fn transaction_from_row(row: &SqliteRow) -> ReconcileResult<Transaction> {
        let date: String = row.try_get("date")?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
            ReconcileError::Storage(format!("Invalid transaction date '{}': {}", date, e))
        })?;
        let amount: i64 = row.try_get("amount")?;
        let payee: Option<String> = row.try_get("payee_name")?;
        let cleared: String = row.try_get("cleared")?;

        Ok(Transaction {
            id: row.try_get("id")?,
            budget_id: row.try_get("budget_id")?,
            account_id: row.try_get("account_id")?,
            date,
            amount: -from_milliunits(amount),
            payee: payee.unwrap_or_default(),
            cleared: cleared.parse()?,
        })
    }
}

#[async_trait]
impl SnapshotProvider for SqliteSnapshotProvider {
    async fn find_accounts(&self, patterns: &[String]) -> ReconcileResult<Vec<AccountSnapshot>> {
        let rows = sqlx::query(OPEN_ACCOUNTS_QUERY)
            .fetch_all(&self.pool)
            .await?;

        let accounts = rows
            .iter()
            .map(Self::account_from_row)
            .collect::<ReconcileResult<Vec<_>>>()?;

        tracing::debug!(open_accounts = accounts.len(), "Loaded accounts");
        resolve_patterns(&accounts, patterns)
    }

    async fn unreconciled_transactions(
        &self,
        accounts: &[AccountSnapshot],
    ) -> ReconcileResult<Vec<Vec<Transaction>>> {
        let mut grouped = Vec::with_capacity(accounts.len());

        for account in accounts {
            let rows = sqlx::query(UNRECONCILED_QUERY)
                .bind(&account.account_id)
                .fetch_all(&self.pool)
                .await?;

            let transactions = rows
                .iter()
                .map(Self::transaction_from_row)
                .collect::<ReconcileResult<Vec<_>>>()?;

            tracing::debug!(
                account = %account.label(),
                count = transactions.len(),
                "Loaded unreconciled transactions"
            );
            grouped.push(transactions);
        }

        Ok(grouped)
    }
}
