//! Core types and data structures for the reconciler

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of milliunits in one currency unit, as stored by the budgeting service
pub const MILLIUNITS_PER_UNIT: i64 = 1000;

/// Clearing status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    /// Entered in the budget but not yet seen on a statement
    Uncleared,
    /// Seen on a statement, already counted in the cleared balance
    Cleared,
    /// Locked in by a previous reconciliation
    Reconciled,
}

impl ClearedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClearedStatus::Uncleared => "uncleared",
            ClearedStatus::Cleared => "cleared",
            ClearedStatus::Reconciled => "reconciled",
        }
    }
}

impl fmt::Display for ClearedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClearedStatus {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uncleared" => Ok(ClearedStatus::Uncleared),
            "cleared" => Ok(ClearedStatus::Cleared),
            "reconciled" => Ok(ClearedStatus::Reconciled),
            other => Err(ReconcileError::Storage(format!(
                "Unknown cleared status '{}'",
                other
            ))),
        }
    }
}

/// Account categories as reported by the budgeting service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountKind {
    Checking,
    Savings,
    Cash,
    CreditCard,
    LineOfCredit,
    OtherAsset,
    OtherLiability,
    Mortgage,
    AutoLoan,
    StudentLoan,
    PersonalLoan,
    MedicalDebt,
    OtherDebt,
    /// Any category this crate does not know about yet
    Other(String),
}

impl AccountKind {
    /// Whether a user-supplied target must be negated to match the ledger's
    /// internal sign convention.
    ///
    /// Asset accounts (checking, savings, cash) are displayed with the opposite
    /// sign from the one the ledger is stored in.
    pub fn inverts_target(&self) -> bool {
        matches!(
            self,
            AccountKind::Checking | AccountKind::Savings | AccountKind::Cash
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Cash => "cash",
            AccountKind::CreditCard => "creditCard",
            AccountKind::LineOfCredit => "lineOfCredit",
            AccountKind::OtherAsset => "otherAsset",
            AccountKind::OtherLiability => "otherLiability",
            AccountKind::Mortgage => "mortgage",
            AccountKind::AutoLoan => "autoLoan",
            AccountKind::StudentLoan => "studentLoan",
            AccountKind::PersonalLoan => "personalLoan",
            AccountKind::MedicalDebt => "medicalDebt",
            AccountKind::OtherDebt => "otherDebt",
            AccountKind::Other(name) => name,
        }
    }
}

impl From<&str> for AccountKind {
    fn from(s: &str) -> Self {
        match s {
            "checking" => AccountKind::Checking,
            "savings" => AccountKind::Savings,
            "cash" => AccountKind::Cash,
            "creditCard" => AccountKind::CreditCard,
            "lineOfCredit" => AccountKind::LineOfCredit,
            "otherAsset" => AccountKind::OtherAsset,
            "otherLiability" => AccountKind::OtherLiability,
            "mortgage" => AccountKind::Mortgage,
            "autoLoan" => AccountKind::AutoLoan,
            "studentLoan" => AccountKind::StudentLoan,
            "personalLoan" => AccountKind::PersonalLoan,
            "medicalDebt" => AccountKind::MedicalDebt,
            "otherDebt" => AccountKind::OtherDebt,
            other => AccountKind::Other(other.to_string()),
        }
    }
}

impl From<String> for AccountKind {
    fn from(s: String) -> Self {
        AccountKind::from(s.as_str())
    }
}

impl From<AccountKind> for String {
    fn from(kind: AccountKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single not-yet-reconciled transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier, unique within the owning budget
    pub id: String,
    /// Budget (ledger) the transaction belongs to
    pub budget_id: String,
    /// Account the transaction is posted to
    pub account_id: String,
    /// Posting date; determines the order transactions are searched in
    pub date: NaiveDate,
    /// Signed amount in the ledger's internal sign convention
    pub amount: BigDecimal,
    /// Payee label, empty when the service has none
    pub payee: String,
    /// Clearing status at snapshot time
    pub cleared: ClearedStatus,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(
        id: impl Into<String>,
        budget_id: impl Into<String>,
        account_id: impl Into<String>,
        date: NaiveDate,
        amount: BigDecimal,
        payee: impl Into<String>,
        cleared: ClearedStatus,
    ) -> Self {
        Self {
            id: id.into(),
            budget_id: budget_id.into(),
            account_id: account_id.into(),
            date,
            amount,
            payee: payee.into(),
            cleared,
        }
    }
}

/// Point-in-time view of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub budget_id: String,
    pub budget_name: String,
    pub account_id: String,
    pub account_name: String,
    pub kind: AccountKind,
    /// Sum of all cleared and reconciled transactions, internal sign convention
    pub cleared_balance: BigDecimal,
    /// Currency symbol used for display
    pub currency: String,
}

impl AccountSnapshot {
    /// "budget - account", as shown to users
    pub fn label(&self) -> String {
        format!("{} - {}", self.budget_name, self.account_name)
    }

    /// Convert a user-supplied target into the ledger's internal sign convention
    pub fn internal_target(&self, target: &BigDecimal) -> BigDecimal {
        if self.kind.inverts_target() {
            -target.clone()
        } else {
            target.clone()
        }
    }

    /// Convert an internal amount back into the sign the user sees
    pub fn display_amount(&self, amount: &BigDecimal) -> BigDecimal {
        // Same flip in both directions
        self.internal_target(amount)
    }

    /// One-line rendering of a transaction of this account
    pub fn describe(&self, transaction: &Transaction) -> String {
        format!(
            "{:>10} - {}",
            format_amount(&self.display_amount(&transaction.amount), &self.currency),
            transaction.payee
        )
    }
}

/// One (account pattern, target balance) pair requested by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTarget {
    /// Regular expression matched against account names
    pub pattern: String,
    /// Target cleared balance as the user sees it
    pub target: BigDecimal,
}

impl AccountTarget {
    pub fn new(pattern: impl Into<String>, target: BigDecimal) -> Self {
        Self {
            pattern: pattern.into(),
            target,
        }
    }
}

/// Convert integer milliunits into an exact decimal amount
pub fn from_milliunits(milliunits: i64) -> BigDecimal {
    BigDecimal::new(milliunits.into(), 3)
}

/// Render an amount with two decimals and a leading currency symbol
pub fn format_amount(amount: &BigDecimal, currency: &str) -> String {
    let rounded = amount.round(2).with_scale(2);
    if rounded < BigDecimal::from(0) {
        format!("-{}{}", currency, rounded.abs())
    } else {
        format!("{}{}", currency, rounded)
    }
}

/// Errors that can occur while reconciling
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(
        "Must have exactly one account match for '{pattern}', but instead found: {}\nChange account regexes to be more precise and try again.",
        list_matches(.found)
    )]
    AmbiguousMatch {
        pattern: String,
        found: Vec<String>,
    },
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Too many transactions in one request (error 403.4)")]
    RateLimited,
    #[error("Remote service error (HTTP {status}): {id} {detail}")]
    Remote {
        status: u16,
        id: String,
        detail: String,
    },
    #[error("Reconciled {} transaction(s) but {} failed", .reconciled.len(), .failed.len())]
    PartialFailure {
        reconciled: Vec<String>,
        failed: Vec<(String, String)>,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReconcileError {
    /// Whether this is the batch-too-large rejection the applier can recover from
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ReconcileError::RateLimited)
    }
}

fn list_matches(found: &[String]) -> String {
    if found.is_empty() {
        return "nothing!".to_string();
    }
    let mut sorted: Vec<&String> = found.iter().collect();
    sorted.sort();
    sorted
        .iter()
        .map(|name| format!("\n * {}", name))
        .collect()
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milliunits_are_exact() {
        assert_eq!(from_milliunits(-25_000), BigDecimal::from(-25));
        assert_eq!(
            from_milliunits(1_234),
            BigDecimal::from_str("1.234").unwrap()
        );
        assert_eq!(from_milliunits(MILLIUNITS_PER_UNIT), BigDecimal::from(1));
    }

    #[test]
    fn format_amount_puts_sign_before_symbol() {
        assert_eq!(format_amount(&BigDecimal::from(-25), "$"), "-$25.00");
        assert_eq!(
            format_amount(&BigDecimal::from_str("1.5").unwrap(), "€"),
            "€1.50"
        );
    }

    #[test]
    fn asset_accounts_invert_targets() {
        let mut snapshot = AccountSnapshot {
            budget_id: "b".into(),
            budget_name: "Budget".into(),
            account_id: "a".into(),
            account_name: "Checking".into(),
            kind: AccountKind::Checking,
            cleared_balance: BigDecimal::from(0),
            currency: "$".into(),
        };
        assert_eq!(
            snapshot.internal_target(&BigDecimal::from(500)),
            BigDecimal::from(-500)
        );

        let outflow = Transaction::new(
            "t",
            "b",
            "a",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            BigDecimal::from(25),
            "Grocer",
            ClearedStatus::Uncleared,
        );
        assert_eq!(snapshot.describe(&outflow), "   -$25.00 - Grocer");

        snapshot.kind = AccountKind::from("creditCard");
        assert_eq!(
            snapshot.internal_target(&BigDecimal::from(500)),
            BigDecimal::from(500)
        );
    }

    #[test]
    fn account_kind_keeps_unknown_names() {
        let kind = AccountKind::from("cryptoWallet");
        assert_eq!(kind, AccountKind::Other("cryptoWallet".to_string()));
        assert!(!kind.inverts_target());
        assert_eq!(String::from(kind), "cryptoWallet");
    }

    #[test]
    fn cleared_status_parses() {
        assert_eq!(
            "cleared".parse::<ClearedStatus>().unwrap(),
            ClearedStatus::Cleared
        );
        assert!("pending".parse::<ClearedStatus>().is_err());
    }

    #[test]
    fn ambiguous_match_lists_sorted_names() {
        let err = ReconcileError::AmbiguousMatch {
            pattern: "Check".into(),
            found: vec!["Home - Checking".into(), "Biz - Checking".into()],
        };
        let message = err.to_string();
        assert!(message.contains("\n * Biz - Checking\n * Home - Checking"));

        let none = ReconcileError::AmbiguousMatch {
            pattern: "Nope".into(),
            found: vec![],
        };
        assert!(none.to_string().contains("found: nothing!"));
    }
}
