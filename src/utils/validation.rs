//! Validation utilities for user-supplied targets

use bigdecimal::BigDecimal;
use regex::{Regex, RegexBuilder};
use std::str::FromStr;

use crate::types::*;

/// How targets are supplied on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One `--account-name-regex` and one `--target`
    Single,
    /// Any number of `REGEX=TARGET` pairs
    Batch,
}

/// Parse a money amount, ignoring `$` and `,`
pub fn parse_amount(raw: &str) -> ReconcileResult<BigDecimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(ReconcileError::Input(format!(
            "Amount '{}' is empty",
            raw
        )));
    }

    BigDecimal::from_str(cleaned)
        .map_err(|e| ReconcileError::Input(format!("Invalid amount '{}': {}", raw, e)))
}

/// Parse an `ACCOUNT_NAME_REGEX=TARGET` pair
pub fn parse_account_target_pair(pair: &str) -> ReconcileResult<AccountTarget> {
    let (pattern, target) = pair.split_once('=').ok_or_else(|| {
        ReconcileError::Input(format!(
            "Expected ACCOUNT_NAME_REGEX=TARGET, got '{}'",
            pair
        ))
    })?;

    Ok(AccountTarget::new(pattern, parse_amount(target)?))
}

/// Validate that an account pattern is usable
pub fn validate_pattern(pattern: &str) -> ReconcileResult<()> {
    if pattern.trim().is_empty() {
        return Err(ReconcileError::Input(
            "Account name regex cannot be empty".to_string(),
        ));
    }

    account_regex(pattern).map(|_| ())
}

/// Compile an account name pattern; matching ignores case
pub fn account_regex(pattern: &str) -> ReconcileResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ReconcileError::Input(format!("Invalid account name regex '{}': {}", pattern, e)))
}

/// Validate a full list of targets before any work starts
pub fn validate_targets(targets: &[AccountTarget]) -> ReconcileResult<()> {
    if targets.is_empty() {
        return Err(ReconcileError::Input(
            "At least one account target is required".to_string(),
        ));
    }

    for target in targets {
        validate_pattern(&target.pattern)?;
    }

    Ok(())
}

/// Turn command-line arguments into targets, enforcing which flags belong to
/// which mode
pub fn resolve_targets(
    mode: Mode,
    account_name_regex: Option<&str>,
    target: Option<&str>,
    account_target_pairs: &[String],
) -> ReconcileResult<Vec<AccountTarget>> {
    let targets = match mode {
        Mode::Single => {
            if !account_target_pairs.is_empty() {
                return Err(ReconcileError::Input(
                    "`--account-target-pairs` is only valid when `--mode batch` is selected."
                        .to_string(),
                ));
            }
            match (account_name_regex, target) {
                (Some(pattern), Some(target)) => {
                    vec![AccountTarget::new(pattern, parse_amount(target)?)]
                }
                _ => {
                    return Err(ReconcileError::Input(
                        "`--mode single` requires both `--account-name-regex` and `--target`."
                            .to_string(),
                    ))
                }
            }
        }
        Mode::Batch => {
            if account_name_regex.is_some() || target.is_some() {
                return Err(ReconcileError::Input(
                    "`--mode batch` cannot be used with `--account-name-regex` or `--target`; use `--account-target-pairs` instead."
                        .to_string(),
                ));
            }
            if account_target_pairs.is_empty() {
                return Err(ReconcileError::Input(
                    "`--mode batch` requires `--account-target-pairs`.".to_string(),
                ));
            }
            account_target_pairs
                .iter()
                .map(|pair| parse_account_target_pair(pair))
                .collect::<ReconcileResult<Vec<_>>>()?
        }
    };

    validate_targets(&targets)?;
    Ok(targets)
}
