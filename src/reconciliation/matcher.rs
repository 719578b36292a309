//! Search for the transactions that bring the cleared balance to a target

use bigdecimal::BigDecimal;

use crate::traits::{NoProgress, Progress};
use crate::types::*;

/// Outcome of a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Transactions to reconcile: every cleared one, then the chosen uncleared ones
    pub transactions: Vec<Transaction>,
    /// Whether the target is reachable
    pub found: bool,
    /// Number of uncleared combinations evaluated
    pub combinations_tested: u64,
}

impl MatchResult {
    fn already_met() -> Self {
        Self {
            transactions: Vec::new(),
            found: true,
            combinations_tested: 0,
        }
    }

    /// Found, but nothing needs to change
    pub fn is_noop(&self) -> bool {
        self.found && self.transactions.is_empty()
    }
}

/// Number of subsets of `n` items, saturating at `u64::MAX`
pub fn combination_count(n: usize) -> u64 {
    u32::try_from(n)
        .ok()
        .and_then(|shift| 1u64.checked_shl(shift))
        .unwrap_or(u64::MAX)
}

/// Find the smallest set of uncleared transactions that, together with the
/// cleared ones, makes the cleared balance equal `target`
///
/// `target` must already be in the ledger's internal sign convention.
/// Combinations are tried by increasing size and, within one size, in input
/// order, so the first hit is minimal and ties go to the earliest transactions.
pub fn find_to_reconcile(
    transactions: &[Transaction],
    cleared_balance: &BigDecimal,
    target: &BigDecimal,
) -> MatchResult {
    find_to_reconcile_with_progress(transactions, cleared_balance, target, &NoProgress)
}

/// [`find_to_reconcile`], reporting each tested combination to `progress`
pub fn find_to_reconcile_with_progress(
    transactions: &[Transaction],
    cleared_balance: &BigDecimal,
    target: &BigDecimal,
    progress: &dyn Progress,
) -> MatchResult {
    let (cleared, uncleared): (Vec<&Transaction>, Vec<&Transaction>) = transactions
        .iter()
        .filter(|t| t.cleared != ClearedStatus::Reconciled)
        .partition(|t| t.cleared == ClearedStatus::Cleared);

    let cleared_sum: BigDecimal = cleared.iter().map(|t| &t.amount).sum();
    let reconciled_balance = cleared_balance - &cleared_sum;

    tracing::debug!(
        cleared = cleared.len(),
        uncleared = uncleared.len(),
        %reconciled_balance,
        %target,
        "Searching for reconciliation match"
    );

    if cleared.is_empty() && &reconciled_balance == target {
        return MatchResult::already_met();
    }

    // What the chosen uncleared transactions have to add up to
    let needed = target - (reconciled_balance + cleared_sum);

    progress.start("Testing combinations", combination_count(uncleared.len()));

    let mut tested: u64 = 0;
    for size in 0..=uncleared.len() {
        let mut combo = Combinations::new(uncleared.len(), size);
        while let Some(indices) = combo.next_indices() {
            tested = tested.saturating_add(1);
            progress.advance(1);

            let sum: BigDecimal = indices.iter().map(|&i| &uncleared[i].amount).sum();
            if sum == needed {
                progress.finish();
                tracing::info!(size, tested, "Match found");

                let transactions = cleared
                    .iter()
                    .copied()
                    .chain(indices.iter().map(|&i| uncleared[i]))
                    .cloned()
                    .collect();
                return MatchResult {
                    transactions,
                    found: true,
                    combinations_tested: tested,
                };
            }
        }
    }

    progress.finish();
    tracing::info!(tested, "No combination reaches the target");

    MatchResult {
        transactions: Vec::new(),
        found: false,
        combinations_tested: tested,
    }
}

/// Lexicographic k-combinations of the indices `0..n`
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
        }
    }

    fn next_indices(&mut self) -> Option<&[usize]> {
        let k = self.indices.len();
        if k > self.n {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.indices);
        }

        // Rightmost position that can still move forward
        let pos = (0..k).rev().find(|&i| self.indices[i] != i + self.n - k)?;
        self.indices[pos] += 1;
        for i in pos + 1..k {
            self.indices[i] = self.indices[i - 1] + 1;
        }
        Some(&self.indices)
    }
}
