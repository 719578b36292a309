//! Snapshot providers for account balances and unreconciled transactions

pub mod memory;
pub mod sqlite;

pub use memory::*;
pub use sqlite::*;

use crate::types::*;
use crate::utils::account_regex;

/// Pick exactly one account per pattern, in pattern order
///
/// A pattern is searched anywhere in the account name, ignoring case.
pub(crate) fn resolve_patterns(
    accounts: &[AccountSnapshot],
    patterns: &[String],
) -> ReconcileResult<Vec<AccountSnapshot>> {
    patterns
        .iter()
        .map(|pattern| {
            let regex = account_regex(pattern)?;

            let matched: Vec<&AccountSnapshot> = accounts
                .iter()
                .filter(|account| regex.is_match(&account.account_name))
                .collect();

            match matched.as_slice() {
                [single] => Ok((*single).clone()),
                _ => Err(ReconcileError::AmbiguousMatch {
                    pattern: pattern.clone(),
                    found: matched.iter().map(|account| account.label()).collect(),
                }),
            }
        })
        .collect()
}
